use serde::{Deserialize, Serialize};

use super::kinds::{ErrorKind, ExportError};

/// Structured error information extracted from MongoDB errors.
///
/// Serialized to compact JSON and embedded in the message of the
/// [`ExportError`] that wraps the driver error, so log lines carry the
/// driver's classification without string parsing.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Extract structured information from a MongoDB error using the driver API.
///
/// This avoids string parsing where possible by using the driver's typed error
/// structures directly.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::ErrorKind as DriverKind;

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        DriverKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = get_error_name(command_error.code);
        }
        DriverKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        DriverKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        DriverKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        DriverKind::DnsResolve { message, .. } => {
            info.error_type = Some("mongo.dns_resolve_error".to_string());
            info.message = Some(message.clone());
        }
        DriverKind::Io(io_error) => {
            info.error_type = Some("mongo.io_error".to_string());
            info.message = Some(io_error.to_string());
        }
        _ => {
            // For other error types, fall back to the Display representation.
            info.message = Some(error.to_string());
        }
    }

    info
}

/// Wrap a driver error into an [`ExportError`] of the given kind.
///
/// The message is the caller's context followed by the compact JSON form of
/// the extracted [`ErrorInfo`].
pub fn wrap_driver_error(
    kind: ErrorKind,
    context: &str,
    error: mongodb::error::Error,
) -> ExportError {
    let info = extract_error_info(&error);
    let message = match info.to_json_compact() {
        Ok(json) => format!("{context} {json}"),
        Err(_) => context.to_string(),
    };
    ExportError::new(kind, message).with_source(error)
}

/// Get a human-readable error name from a MongoDB error code.
fn get_error_name(code: i32) -> Option<String> {
    let name = match code {
        6 => "HostUnreachable",
        7 => "HostNotFound",
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        50 => "MaxTimeMSExpired",
        89 => "NetworkTimeout",
        _ => return None,
    };

    Some(name.to_string())
}
