use std::error::Error as StdError;
use std::fmt;

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of everything that can end an export run.
///
/// The pipeline decides how to log and report a failure by matching on
/// this value, never by inspecting the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// One or more required run settings are absent or blank.
    ConfigMissing,

    /// A settings file or connection string could not be understood.
    ConfigInvalid,

    /// The source database could not be reached.
    Connectivity,

    /// The source collection returned no documents.
    NoData,

    /// The target blob container does not exist.
    ContainerNotFound,

    /// Network or service failure while talking to the source or the sink.
    Transport,

    /// The tabular serializer failed to produce output.
    Encoding,

    /// Releasing the source connection failed.
    Disconnect,
}

impl ErrorKind {
    /// Stable label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::ConfigMissing => "ConfigMissing",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::Connectivity => "ConnectivityError",
            ErrorKind::NoData => "NoDataError",
            ErrorKind::ContainerNotFound => "ContainerNotFoundError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Encoding => "EncodingError",
            ErrorKind::Disconnect => "DisconnectError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Top-level error type for export operations.
///
/// A tagged error: the [`ErrorKind`] drives classification, the message
/// carries the human-readable context, and the optional source keeps the
/// underlying driver or I/O error for the log chain.
#[derive(Debug)]
pub struct ExportError {
    kind: ErrorKind,
    message: String,
    source: Option<BoxedSource>,
}

impl ExportError {
    /// Create an error of the given kind with a message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn config_missing(missing: &[&str]) -> Self {
        Self::new(
            ErrorKind::ConfigMissing,
            format!("Missing required settings: {}", missing.join(", ")),
        )
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connectivity, message)
    }

    pub fn no_data(collection: &str) -> Self {
        Self::new(
            ErrorKind::NoData,
            format!("No documents found in collection '{collection}'"),
        )
    }

    pub fn container_not_found(container: &str) -> Self {
        Self::new(
            ErrorKind::ContainerNotFound,
            format!("Container '{container}' does not exist"),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encoding, message)
    }

    pub fn disconnect(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Disconnect, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the message followed by every underlying cause.
    pub fn chain(&self) -> String {
        let mut rendered = self.message.clone();
        let mut current = self.source();
        while let Some(cause) = current {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            current = cause.source();
        }
        rendered
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/* ========================= Conversions to ExportError ========================= */

impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::config_invalid("Invalid settings file").with_source(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::encoding("Failed to write CSV record").with_source(err)
    }
}
