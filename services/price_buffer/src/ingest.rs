//! Newline-delimited JSON ingestion
//!
//! Each line carries one batch envelope:
//!
//! ```text
//! {"region": "eu", "type": "fast", "items": [{"unique_name": "T4_SWORD", "price_caerleon": 1000}]}
//! ```

use crate::buffer::{AddOutcome, PriceBuffer};
use crate::error::Result;
use crate::fields::ItemPriceUpdate;
use crate::router::PartitionSelector;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

/// One submitted batch: a partition selector plus its items
#[derive(Debug, Clone, Deserialize)]
pub struct BatchEnvelope {
    #[serde(flatten)]
    pub selector: PartitionSelector,
    #[serde(default)]
    pub items: Vec<ItemPriceUpdate>,
}

/// Parse one line and merge it into the buffer. Blank lines yield `None`.
pub fn ingest_line(buffer: &PriceBuffer, line: &str) -> Result<Option<AddOutcome>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let envelope: BatchEnvelope = serde_json::from_str(line)?;
    Ok(Some(buffer.add_updates(&envelope.selector, envelope.items)))
}

/// Totals for one ingestion stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub batches: usize,
    pub merged: usize,
    pub rejected_lines: usize,
    pub unknown_partitions: usize,
}

impl IngestSummary {
    pub fn record(&mut self, outcome: &AddOutcome) {
        self.batches += 1;
        match outcome {
            AddOutcome::Accepted { merged, .. } => self.merged += merged,
            AddOutcome::UnknownPartition => self.unknown_partitions += 1,
        }
    }
}

/// Read envelopes until EOF. Malformed lines (bad JSON, invalid UTF-8) are
/// logged and skipped; only I/O errors end the stream early.
pub async fn ingest_stream<R>(buffer: &PriceBuffer, mut reader: R) -> Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = IngestSummary::default();
    let mut raw = Vec::new();
    let mut line_no = 0usize;

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                warn!(line = line_no, error = %e, "rejecting batch with invalid UTF-8");
                summary.rejected_lines += 1;
                continue;
            }
        };

        match ingest_line(buffer, line) {
            Ok(Some(outcome)) => summary.record(&outcome),
            Ok(None) => {}
            Err(e) => {
                warn!(line = line_no, error = %e, "rejecting malformed batch");
                summary.rejected_lines += 1;
            }
        }
    }

    Ok(summary)
}
