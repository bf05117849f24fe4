//! Error handling for the export pipeline.
//!
//! This module provides:
//! - A tagged [`ExportError`] whose [`ErrorKind`] drives classification
//! - Structured information extracted from MongoDB driver errors for logging
//!
//! # Example
//!
//! ```rust
//! use mongo_blob_export::error::{ErrorKind, ExportError};
//!
//! let err = ExportError::no_data("orders");
//! assert_eq!(err.kind(), ErrorKind::NoData);
//! assert_eq!(err.kind().label(), "NoDataError");
//! ```

pub mod kinds;
pub mod mongo;

// Re-export commonly used types
pub use kinds::{ErrorKind, ExportError, Result};
pub use mongo::ErrorInfo;
