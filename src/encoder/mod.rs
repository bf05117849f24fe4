//! Tabular (CSV) encoding of a record batch
//!
//! The header is taken from the first record. Every record, the first
//! included, is projected onto those columns: extra fields are dropped and
//! missing ones render as empty fields. Non-numeric fields are quoted and
//! embedded quotes are doubled.

mod cell;

pub use cell::{BsonConverter, CellConverter};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::model::{EncodedPayload, RecordBatch};

/// Converts a record batch into CSV text
#[derive(Debug, Default, Clone)]
pub struct TabularEncoder {
    converter: CellConverter,
}

impl TabularEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a batch
    ///
    /// # Arguments
    /// * `batch` - Non-empty batch of records
    ///
    /// # Returns
    /// * `Result<EncodedPayload>` - Header line plus one line per record
    pub fn encode(&self, batch: &RecordBatch) -> Result<EncodedPayload> {
        let columns = batch.columns();

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(&columns)?;

        for record in batch.records() {
            let row = columns
                .iter()
                .map(|column| self.converter.convert_optional(record.get(*column)));
            writer.write_record(row)?;
        }

        let bytes = writer.into_inner().map_err(|e| {
            ExportError::encoding("Failed to flush CSV output").with_source(e.into_error())
        })?;

        debug!(
            "Encoded {} records x {} columns into {} bytes",
            batch.len(),
            columns.len(),
            bytes.len()
        );

        Ok(EncodedPayload::new(bytes))
    }
}
