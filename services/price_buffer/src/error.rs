//! Error types for the price buffer service

use crate::router::PriceTable;
use thiserror::Error;

/// Result type alias for buffer-side operations
pub type Result<T> = std::result::Result<T, BufferError>;

/// Errors raised by a persistence backend inside a flush transaction
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or connection dropped mid-transaction
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// Insert hit an existing row; the upsert path should have updated it
    #[error("Duplicate key '{key}' in table {table}")]
    DuplicateKey {
        /// Table the insert targeted
        table: PriceTable,
        /// Entity key that already exists
        key: String,
    },

    /// Any other constraint rejected the write
    #[error("Constraint violation in table {table}: {reason}")]
    Constraint {
        /// Table the write targeted
        table: PriceTable,
        /// Backend-provided reason
        reason: String,
    },

    /// Failure injected by a test store
    #[error("Injected failure on write #{0}")]
    Injected(u64),
}

impl StoreError {
    /// Whether retrying the same flush later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Injected(_))
    }
}

/// Errors surfaced at the service edge (ingestion, wiring)
#[derive(Debug, Error)]
pub enum BufferError {
    /// Malformed ingestion payload
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::DuplicateKey {
            table: PriceTable::ItemFastEu,
            key: "T4_SWORD".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate key 'T4_SWORD' in table item_fast_eu");
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Connection("reset by peer".into()).is_transient());
        assert!(!StoreError::Constraint {
            table: PriceTable::ItemOrderAs,
            reason: "empty key".into(),
        }
        .is_transient());
    }

    #[test]
    fn test_buffer_error_from_json_error() {
        let err: BufferError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(err.to_string().starts_with("Failed to parse JSON"));
    }
}
