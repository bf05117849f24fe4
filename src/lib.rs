//! MongoDB to blob storage exporter
//!
//! On each trigger, every document of one MongoDB collection is read,
//! encoded as CSV and uploaded as `data-export-<timestamp>.csv` into a blob
//! container. The connect step is retried; every other failure ends the run.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Settings file and run settings
//! - `connection`: MongoDB source connector
//! - `encoder`: CSV encoding of fetched documents
//! - `error`: Error types and classification
//! - `model`: Records, batches, payloads and targets
//! - `pipeline`: Run orchestration
//! - `retry`: Fixed-delay retry executor
//! - `storage`: Blob sink (Azure, local filesystem, in-memory)
//! - `trigger`: Trigger events and an interval trigger
//!
//! # Example
//!
//! ```no_run
//! use mongo_blob_export::{
//!     ExportPipeline, MongoSource, ObjectStoreUploader, RunSettings, TriggerEvent,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = ExportPipeline::new(MongoSource::default(), ObjectStoreUploader::new());
//!     let outcome = pipeline
//!         .run(&TriggerEvent::now(), &RunSettings::from_env())
//!         .await;
//!     println!("success: {}", outcome.is_success());
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod trigger;

// Re-export commonly used types
pub use config::{Config, RunContext, RunSettings};
pub use connection::{ConnectTimeouts, MongoSource, SourceConnector};
pub use encoder::TabularEncoder;
pub use error::{ErrorKind, ExportError, Result};
pub use model::{EncodedPayload, ExportTarget, Record, RecordBatch};
pub use pipeline::{ExportPipeline, RunOutcome, RunState, Terminal};
pub use retry::RetryPolicy;
pub use storage::{ObjectStoreUploader, SinkUploader};
pub use trigger::{IntervalTrigger, TriggerEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
