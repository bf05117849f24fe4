//! Export pipeline orchestration.
//!
//! One run walks a strictly linear sequence of states:
//!
//! ```text
//! Init -> Validated -> Connected -> Fetched -> Encoded -> Uploaded -> Disconnected
//! ```
//!
//! Any failure ends the run. If a source connection was established it is
//! released before the run terminates, and a failure to release it is only
//! logged. Errors never cross [`ExportPipeline::run`]: they are classified,
//! logged and folded into the returned [`RunOutcome`].

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Config, RunContext, RunSettings};
use crate::connection::{ConnectTimeouts, SourceConnector};
use crate::encoder::TabularEncoder;
use crate::error::{ErrorKind, ExportError, Result};
use crate::model::ExportTarget;
use crate::retry::RetryPolicy;
use crate::storage::SinkUploader;
use crate::trigger::TriggerEvent;

/// Position of a run in the export sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Validated,
    Connected,
    Fetched,
    Encoded,
    Uploaded,
    Disconnected,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// The blob was written
    Success {
        blob_name: String,
        records: usize,
        bytes: usize,
    },

    /// The run stopped; `at` is the last state reached before the failure
    Failed { kind: ErrorKind, at: RunState },
}

/// Record of one run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub fired_at: DateTime<Utc>,
    /// Every state visited, in order
    pub states: Vec<RunState>,
    pub terminal: Terminal,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.terminal, Terminal::Success { .. })
    }

    /// Error kind of a failed run
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self.terminal {
            Terminal::Failed { kind, .. } => Some(kind),
            Terminal::Success { .. } => None,
        }
    }
}

/// Summary of a completed upload
struct Receipt {
    blob_name: String,
    records: usize,
    bytes: usize,
}

/// Ordered list of visited states with transition logging
struct StateTrail {
    states: Vec<RunState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            states: vec![RunState::Init],
        }
    }

    fn current(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Init)
    }

    fn advance(&mut self, next: RunState) {
        debug!("State {:?} -> {:?}", self.current(), next);
        self.states.push(next);
    }
}

/// Connect, fetch, encode and upload, once per trigger
pub struct ExportPipeline<S, U> {
    source: S,
    sink: U,
    encoder: TabularEncoder,
    retry: RetryPolicy,
    timeouts: ConnectTimeouts,
}

impl<S, U> ExportPipeline<S, U>
where
    S: SourceConnector,
    U: SinkUploader,
{
    /// Create a pipeline with the default retry policy and timeouts
    pub fn new(source: S, sink: U) -> Self {
        Self {
            source,
            sink,
            encoder: TabularEncoder::new(),
            retry: RetryPolicy::default(),
            timeouts: ConnectTimeouts::default(),
        }
    }

    /// Create a pipeline tuned by a settings file
    pub fn from_config(source: S, sink: U, config: &Config) -> Self {
        Self::new(source, sink)
            .with_retry(RetryPolicy::from(&config.retry))
            .with_timeouts(ConnectTimeouts::from(config))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: ConnectTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Execute one export run
    ///
    /// # Arguments
    /// * `trigger` - The firing that started this run
    /// * `settings` - Raw run settings, validated before any I/O
    ///
    /// # Returns
    /// * `RunOutcome` - Always returned; failures are logged, not raised
    pub async fn run(&self, trigger: &TriggerEvent, settings: &RunSettings) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "export_run",
            %run_id,
            timestamp = %trigger.fired_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        self.run_in_span(run_id, trigger, settings)
            .instrument(span)
            .await
    }

    async fn run_in_span(
        &self,
        run_id: Uuid,
        trigger: &TriggerEvent,
        settings: &RunSettings,
    ) -> RunOutcome {
        let mut trail = StateTrail::new();
        let finish = |trail: StateTrail, terminal: Terminal| RunOutcome {
            run_id,
            fired_at: trigger.fired_at,
            states: trail.states,
            terminal,
        };

        if trigger.past_due {
            warn!("Trigger is running late");
        }
        info!("Export run started");

        let context = match settings.validate() {
            Ok(context) => context,
            Err(e) => {
                let terminal = self.report_failure(&e, trail.current());
                return finish(trail, terminal);
            }
        };
        trail.advance(RunState::Validated);

        let target = ExportTarget::for_run(&context.sink_container, trigger.fired_at);
        let container = match self
            .sink
            .container(&context.sink_connection_string, &target.container)
        {
            Ok(container) => container,
            Err(e) => {
                let terminal = self.report_failure(&e, trail.current());
                return finish(trail, terminal);
            }
        };

        info!(
            "Connecting to source database '{}' (up to {} attempts)",
            context.source_database,
            self.retry.max_attempts()
        );
        let source = &self.source;
        let uri = context.source_connection_string.as_str();
        let timeouts = &self.timeouts;
        let connection = match self.retry.execute(move || source.connect(uri, timeouts)).await {
            Ok(connection) => connection,
            Err(e) => {
                let terminal = self.report_failure(&e, trail.current());
                return finish(trail, terminal);
            }
        };
        trail.advance(RunState::Connected);
        info!("Connected to source");

        let transferred = self
            .transfer(&connection, &container, &context, &target, &mut trail)
            .await;
        let reached = trail.current();

        self.release(connection).await;
        trail.advance(RunState::Disconnected);

        let terminal = match transferred {
            Ok(receipt) => {
                info!(
                    "Export run succeeded: {} records, {} bytes written to {}/{}",
                    receipt.records, receipt.bytes, target.container, receipt.blob_name
                );
                Terminal::Success {
                    blob_name: receipt.blob_name,
                    records: receipt.records,
                    bytes: receipt.bytes,
                }
            }
            Err(e) => self.report_failure(&e, reached),
        };
        finish(trail, terminal)
    }

    /// Fetch, encode and upload over an established connection
    async fn transfer(
        &self,
        connection: &S::Connection,
        container: &U::Container,
        context: &RunContext,
        target: &ExportTarget,
        trail: &mut StateTrail,
    ) -> Result<Receipt> {
        info!(
            "Fetching all documents from {}.{}",
            context.source_database, context.source_collection
        );
        let batch = self
            .source
            .fetch_all(connection, &context.source_database, &context.source_collection)
            .await?;
        trail.advance(RunState::Fetched);
        info!("Fetched {} documents", batch.len());

        let payload = self.encoder.encode(&batch)?;
        let records = batch.len();
        drop(batch);
        trail.advance(RunState::Encoded);
        info!("Encoded {} records into {} bytes of CSV", records, payload.len());

        self.sink
            .ensure_container(container, &target.container)
            .await?;
        info!(
            "Uploading blob '{}' to container '{}'",
            target.blob_name, target.container
        );
        self.sink
            .write(container, &target.blob_name, &payload)
            .await?;
        trail.advance(RunState::Uploaded);

        Ok(Receipt {
            blob_name: target.blob_name.clone(),
            records,
            bytes: payload.len(),
        })
    }

    /// Release the source connection; failures are logged and swallowed
    async fn release(&self, connection: S::Connection) {
        match self.source.disconnect(connection).await {
            Ok(()) => info!("Source connection closed"),
            Err(e) => warn!(
                kind = ErrorKind::Disconnect.label(),
                "Failed to close source connection: {}",
                e.chain()
            ),
        }
    }

    /// Log a failure with its classification and return the terminal state
    fn report_failure(&self, err: &ExportError, at: RunState) -> Terminal {
        let kind = err.kind();
        error!(
            kind = kind.label(),
            stage = ?at,
            "Export run failed: {}",
            err.chain()
        );

        match kind {
            ErrorKind::ConfigMissing => {
                error!("Set the missing environment variables; no connection was attempted")
            }
            ErrorKind::ConfigInvalid => {
                error!("Check the settings file and the storage connection string format")
            }
            ErrorKind::Connectivity => error!(
                "Could not reach the source after {} attempts. Verify the connection string, \
                 credentials, network access rules and that the server is running",
                self.retry.max_attempts()
            ),
            ErrorKind::NoData => {
                error!("The source collection is empty; nothing was exported")
            }
            ErrorKind::ContainerNotFound => {
                error!("Create the target container; it is never created automatically")
            }
            ErrorKind::Transport => {
                error!("A network or service call failed; the next trigger reruns the export")
            }
            ErrorKind::Encoding => error!("The CSV serializer failed; no blob was written"),
            ErrorKind::Disconnect => error!("Releasing the source connection failed"),
        }

        Terminal::Failed { kind, at }
    }
}

#[cfg(test)]
mod tests;
