//! Price Update Buffer
//!
//! Write-coalescing buffer for high-frequency market price updates, with a
//! transactional batch flush into per-partition price tables.
//!
//! Producers call [`PriceBuffer::add_updates`] with a `(region, type)` selector
//! and a batch of sparse per-city prices. Updates for the same item merge field
//! by field in memory until [`FlushCoordinator::flush`] persists everything
//! pending as one upsert transaction. [`FlushScheduler`] drives flushes on a
//! fixed interval.

pub mod buffer;
pub mod error;
pub mod fields;
pub mod flush;
pub mod ingest;
pub mod logging;
pub mod router;
pub mod scheduler;
pub mod store;

pub use buffer::{AddOutcome, BufferSnapshot, BufferStats, PriceBuffer};
pub use error::{BufferError, Result, StoreError};
pub use fields::{augment, ItemPriceUpdate, PendingFields, PriceColumn, PRICE_COLUMNS};
pub use flush::{FlushCoordinator, FlushOutcome, FlushPhase, FlushReport, FlushStatsSnapshot};
pub use ingest::{ingest_line, ingest_stream, BatchEnvelope, IngestSummary};
pub use router::{Partition, PartitionSelector, PriceTable};
pub use scheduler::{FlushScheduler, SchedulerHandle};
pub use store::{MemoryStore, PersistedRow, PriceStore, RowChanges, StoreTransaction, UpsertKind};

/// Re-export key types
pub use types::{City, PriceKind, Region};
