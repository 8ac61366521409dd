//! # Flush Coordinator
//!
//! Moves everything pending in the [`PriceBuffer`] into the store as one
//! transaction.
//!
//! ```text
//! Idle ─► Snapshotting ─► Persisting ─► Committing ─► Idle
//!                            │
//!                            └─(error)─► RollingBack ─► Idle
//! ```
//!
//! The snapshot is taken under the buffer lock and the lock is released before
//! any store I/O. A failed flush rolls back and discards its snapshot: the
//! updates it held are lost, and `rows_touched` is reported as 0. Nothing is
//! retried here; the next flush only carries what arrived afterwards.

use crate::buffer::{BufferSnapshot, PriceBuffer};
use crate::error::StoreError;
use crate::router::Partition;
use crate::store::{PriceStore, RowChanges, StoreTransaction, UpsertKind};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Step of a flush, used to tag traces and failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPhase {
    Snapshotting,
    Persisting,
    Committing,
    RollingBack,
}

impl std::fmt::Display for FlushPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlushPhase::Snapshotting => "snapshotting",
            FlushPhase::Persisting => "persisting",
            FlushPhase::Committing => "committing",
            FlushPhase::RollingBack => "rolling_back",
        };
        f.write_str(name)
    }
}

/// How a flush ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; the store was not touched
    Empty,
    Committed,
    /// The transaction was abandoned and `discarded` keys were lost
    RolledBack {
        phase: FlushPhase,
        error: StoreError,
        discarded: usize,
    },
}

/// Result of one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub outcome: FlushOutcome,
    /// Keys persisted across all partitions; 0 unless committed
    pub rows_touched: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Keys persisted per partition, only for partitions that had pending keys
    pub per_partition: Vec<(Partition, usize)>,
    pub elapsed: Duration,
}

impl FlushReport {
    fn empty(elapsed: Duration) -> Self {
        Self {
            outcome: FlushOutcome::Empty,
            rows_touched: 0,
            inserted: 0,
            updated: 0,
            per_partition: Vec::new(),
            elapsed,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.outcome == FlushOutcome::Committed
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self.outcome, FlushOutcome::RolledBack { .. })
    }
}

/// Running totals across flushes
#[derive(Debug, Default)]
pub struct FlushStats {
    flushes: AtomicU64,
    empty: AtomicU64,
    commits: AtomicU64,
    failures: AtomicU64,
    rows_touched: AtomicU64,
    keys_discarded: AtomicU64,
}

/// Point-in-time copy of [`FlushStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStatsSnapshot {
    pub flushes: u64,
    pub empty: u64,
    pub commits: u64,
    pub failures: u64,
    pub rows_touched: u64,
    pub keys_discarded: u64,
}

impl FlushStats {
    pub fn snapshot(&self) -> FlushStatsSnapshot {
        FlushStatsSnapshot {
            flushes: self.flushes.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rows_touched: self.rows_touched.load(Ordering::Relaxed),
            keys_discarded: self.keys_discarded.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: &FlushReport) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        match &report.outcome {
            FlushOutcome::Empty => {
                self.empty.fetch_add(1, Ordering::Relaxed);
            }
            FlushOutcome::Committed => {
                self.commits.fetch_add(1, Ordering::Relaxed);
                self.rows_touched
                    .fetch_add(report.rows_touched as u64, Ordering::Relaxed);
            }
            FlushOutcome::RolledBack { discarded, .. } => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.keys_discarded
                    .fetch_add(*discarded as u64, Ordering::Relaxed);
            }
        }
    }
}

#[derive(Debug, Default)]
struct PersistCounts {
    inserted: usize,
    updated: usize,
    per_partition: Vec<(Partition, usize)>,
}

struct PersistFailure {
    phase: FlushPhase,
    error: StoreError,
}

impl PersistFailure {
    fn at(phase: FlushPhase) -> impl FnOnce(StoreError) -> Self {
        move |error| Self { phase, error }
    }
}

/// Drives flushes of one buffer
pub struct FlushCoordinator {
    buffer: Arc<PriceBuffer>,
    stats: FlushStats,
}

impl FlushCoordinator {
    pub fn new(buffer: Arc<PriceBuffer>) -> Self {
        Self {
            buffer,
            stats: FlushStats::default(),
        }
    }

    pub fn buffer(&self) -> &Arc<PriceBuffer> {
        &self.buffer
    }

    pub fn stats(&self) -> FlushStatsSnapshot {
        self.stats.snapshot()
    }

    /// Persist everything pending as one transaction.
    ///
    /// Never fails: store errors roll the transaction back and are reported in
    /// the returned [`FlushReport`]. Overlapping calls are safe, each one
    /// persists a disjoint snapshot.
    pub async fn flush(&self, store: &dyn PriceStore) -> FlushReport {
        let started = Instant::now();

        debug!(phase = %FlushPhase::Snapshotting, "flush started");
        let snapshot = self.buffer.take_snapshot();
        if snapshot.is_empty() {
            debug!("flush skipped, buffer empty");
            let report = FlushReport::empty(started.elapsed());
            self.stats.record(&report);
            return report;
        }

        let keys = snapshot.len();
        let updated_at = Utc::now();

        let report = match persist(store, snapshot, updated_at).await {
            Ok(counts) => {
                let report = FlushReport {
                    outcome: FlushOutcome::Committed,
                    rows_touched: counts.inserted + counts.updated,
                    inserted: counts.inserted,
                    updated: counts.updated,
                    per_partition: counts.per_partition,
                    elapsed: started.elapsed(),
                };
                info!(
                    rows = report.rows_touched,
                    inserted = report.inserted,
                    updated = report.updated,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "flush committed"
                );
                report
            }
            Err(PersistFailure { phase, error }) => {
                error!(
                    phase = %phase,
                    error = %error,
                    transient = error.is_transient(),
                    discarded = keys,
                    "flush rolled back, pending updates discarded"
                );
                FlushReport {
                    outcome: FlushOutcome::RolledBack {
                        phase,
                        error,
                        discarded: keys,
                    },
                    rows_touched: 0,
                    inserted: 0,
                    updated: 0,
                    per_partition: Vec::new(),
                    elapsed: started.elapsed(),
                }
            }
        };

        self.stats.record(&report);
        report
    }
}

async fn persist(
    store: &dyn PriceStore,
    snapshot: BufferSnapshot,
    updated_at: DateTime<Utc>,
) -> Result<PersistCounts, PersistFailure> {
    let mut tx = store
        .begin()
        .await
        .map_err(PersistFailure::at(FlushPhase::Persisting))?;

    let written = write_snapshot(tx.as_mut(), snapshot, updated_at).await;
    match written {
        Ok(counts) => {
            debug!(phase = %FlushPhase::Committing, "committing flush transaction");
            tx.commit()
                .await
                .map_err(PersistFailure::at(FlushPhase::Committing))?;
            Ok(counts)
        }
        Err(error) => {
            debug!(phase = %FlushPhase::RollingBack, "rolling back flush transaction");
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "rollback failed");
            }
            Err(PersistFailure {
                phase: FlushPhase::Persisting,
                error,
            })
        }
    }
}

async fn write_snapshot(
    tx: &mut dyn StoreTransaction,
    snapshot: BufferSnapshot,
    updated_at: DateTime<Utc>,
) -> Result<PersistCounts, StoreError> {
    let mut counts = PersistCounts::default();

    for (partition, pending) in snapshot.into_partitions() {
        let table = partition.table();
        let mut rows: Vec<_> = pending.into_iter().collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(
            phase = %FlushPhase::Persisting,
            %partition,
            %table,
            keys = rows.len(),
            "persisting partition"
        );

        let mut written = 0;
        for (key, fields) in rows {
            let changes = RowChanges::from_pending(fields, updated_at);
            match tx.upsert_row(table, &key, &changes).await? {
                UpsertKind::Updated => counts.updated += 1,
                UpsertKind::Inserted => counts.inserted += 1,
            }
            written += 1;
        }
        counts.per_partition.push((partition, written));
    }

    Ok(counts)
}
