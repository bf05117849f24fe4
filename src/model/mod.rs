//! Data passed through one export run
//!
//! - [`Record`]: one exported document
//! - [`RecordBatch`]: the full, non-empty result set of a run
//! - [`EncodedPayload`]: the tabular text produced from a batch
//! - [`ExportTarget`]: where the payload goes

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use mongodb::bson::Document;

use crate::error::{ExportError, Result};

/// One exported document, keys in stored order
pub type Record = Document;

/// Prefix of every exported blob name
pub const BLOB_NAME_PREFIX: &str = "data-export-";

/// Extension of every exported blob name
pub const BLOB_NAME_EXTENSION: &str = "csv";

/// Ordered, non-empty sequence of records
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    records: Vec<Record>,
}

impl RecordBatch {
    /// Build a batch from fetched records
    ///
    /// # Arguments
    /// * `records` - Documents in fetch order
    /// * `collection` - Source collection name, used in the error message
    ///
    /// # Returns
    /// * `Result<Self>` - The batch, or a `NoData` error when `records` is empty
    pub fn new(records: Vec<Record>, collection: &str) -> Result<Self> {
        if records.is_empty() {
            return Err(ExportError::no_data(collection));
        }
        Ok(Self { records })
    }

    /// Column names taken from the first record, in its key order
    pub fn columns(&self) -> Vec<&str> {
        self.records
            .first()
            .map(|first| first.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Never true for a constructed batch
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Immutable UTF-8 text produced once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    bytes: Bytes,
}

impl EncodedPayload {
    /// MIME type of the payload
    pub const CONTENT_TYPE: &'static str = "text/csv";

    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle on the underlying buffer
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Container and blob name for one run's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub container: String,
    pub blob_name: String,
}

impl ExportTarget {
    /// Derive the target from the run timestamp
    pub fn for_run(container: &str, fired_at: DateTime<Utc>) -> Self {
        Self {
            container: container.to_string(),
            blob_name: blob_name_for(fired_at),
        }
    }
}

/// `data-export-<ISO 8601 timestamp>.csv`, millisecond precision, UTC `Z`
pub fn blob_name_for(fired_at: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        BLOB_NAME_PREFIX,
        fired_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        BLOB_NAME_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;
    use mongodb::bson::doc;

    #[test]
    fn test_empty_batch_is_no_data() {
        let err = RecordBatch::new(Vec::new(), "orders").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
        assert!(err.message().contains("orders"));
    }

    #[test]
    fn test_columns_follow_first_record() {
        let batch = RecordBatch::new(
            vec![doc! { "b": 1, "a": 2 }, doc! { "a": 3, "c": 4 }],
            "orders",
        )
        .unwrap();

        assert_eq!(batch.columns(), vec!["b", "a"]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_blob_name_uses_iso_timestamp() {
        let fired_at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let target = ExportTarget::for_run("exports", fired_at);

        assert_eq!(target.container, "exports");
        assert_eq!(target.blob_name, "data-export-2024-03-09T07:05:00.000Z.csv");
    }

    #[test]
    fn test_payload_accessors() {
        let payload = EncodedPayload::new("a\n1\n");
        assert_eq!(payload.as_bytes(), b"a\n1\n");
        assert_eq!(payload.len(), 4);
        assert_eq!(payload.to_bytes(), Bytes::from_static(b"a\n1\n"));
    }
}
