//! # Coalescing Buffer
//!
//! Process-wide pending state: one `entity_key → PendingFields` map per
//! partition, all behind a single mutex.
//!
//! ```text
//! add_updates ─┐                       ┌─ take_snapshot (flush)
//! add_updates ─┼─► Mutex<[map; 6]> ◄───┤   swaps every map for an empty one
//! add_updates ─┘   merge per field     └─ stats
//! ```
//!
//! The lock only covers in-memory work (merging, swapping maps); persistence
//! happens after the snapshot is taken, so slow store I/O never blocks ingestion.
//! There is no size bound: the buffer grows until the next flush.

use crate::fields::{augment, ItemPriceUpdate, PendingFields};
use crate::router::{Partition, PartitionSelector};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

type PendingMap = HashMap<String, PendingFields>;
type PartitionMaps = [PendingMap; Partition::COUNT];

fn empty_maps() -> PartitionMaps {
    std::array::from_fn(|_| HashMap::new())
}

/// Result of one `add_updates` call. Never an error: unusable input is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Accepted {
        partition: Partition,
        /// Items merged into the buffer
        merged: usize,
        /// Items with nothing to merge
        skipped: usize,
    },
    /// Selector named no known partition; the whole batch was dropped
    UnknownPartition,
}

impl AddOutcome {
    pub fn merged(&self) -> usize {
        match self {
            AddOutcome::Accepted { merged, .. } => *merged,
            AddOutcome::UnknownPartition => 0,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, AddOutcome::Accepted { .. })
    }
}

/// Pending entry counts, for observability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStats {
    /// Every partition with its number of pending keys, in `Partition::ALL` order
    pub per_partition: Vec<(Partition, usize)>,
    pub total_keys: usize,
}

/// Contents of the buffer at one instant, detached from the live buffer
#[derive(Debug, Default)]
pub struct BufferSnapshot {
    partitions: Vec<(Partition, PendingMap)>,
}

impl BufferSnapshot {
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Total entity keys across partitions
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|(_, map)| map.len()).sum()
    }

    pub fn get(&self, partition: Partition) -> Option<&HashMap<String, PendingFields>> {
        self.partitions
            .iter()
            .find(|(p, _)| *p == partition)
            .map(|(_, map)| map)
    }

    /// Non-empty partitions in `Partition::ALL` order
    pub fn into_partitions(
        self,
    ) -> std::vec::IntoIter<(Partition, HashMap<String, PendingFields>)> {
        self.partitions.into_iter()
    }
}

/// Write-coalescing buffer for price updates
pub struct PriceBuffer {
    partitions: Mutex<PartitionMaps>,
}

impl Default for PriceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceBuffer {
    pub fn new() -> Self {
        Self {
            partitions: Mutex::new(empty_maps()),
        }
    }

    /// Merge a batch of updates into the partition named by `selector`.
    ///
    /// Unknown selectors drop the batch. Returns as soon as the in-memory merge
    /// is done; durability comes with the next successful flush.
    pub fn add_updates<I>(&self, selector: &PartitionSelector, items: I) -> AddOutcome
    where
        I: IntoIterator<Item = ItemPriceUpdate>,
    {
        let Some(partition) = Partition::resolve(selector) else {
            warn!(selector = %selector, "dropping price updates for unknown partition");
            return AddOutcome::UnknownPartition;
        };
        self.add_to_partition(partition, items)
    }

    /// Merge a batch of updates into an already-resolved partition
    pub fn add_to_partition<I>(&self, partition: Partition, items: I) -> AddOutcome
    where
        I: IntoIterator<Item = ItemPriceUpdate>,
    {
        // One receive time for the whole batch
        let received_at = Utc::now();

        let mut skipped = 0;
        let augmented: Vec<(String, PendingFields)> = items
            .into_iter()
            .filter_map(|item| {
                let fields = augment(item, received_at);
                if fields.is_none() {
                    skipped += 1;
                }
                fields
            })
            .collect();
        let merged = augmented.len();

        if merged > 0 {
            let mut maps = self.partitions.lock();
            let map = &mut maps[partition.index()];
            for (key, fields) in augmented {
                match map.entry(key) {
                    Entry::Occupied(mut entry) => entry.get_mut().merge(fields),
                    Entry::Vacant(entry) => {
                        entry.insert(fields);
                    }
                }
            }
        }

        debug!(%partition, merged, skipped, "price updates buffered");
        AddOutcome::Accepted {
            partition,
            merged,
            skipped,
        }
    }

    /// Atomically take everything pending and leave empty maps behind
    pub fn take_snapshot(&self) -> BufferSnapshot {
        let taken = std::mem::replace(&mut *self.partitions.lock(), empty_maps());

        let partitions = Partition::ALL
            .into_iter()
            .zip(taken)
            .filter(|(_, map)| !map.is_empty())
            .collect();

        BufferSnapshot { partitions }
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.lock().iter().all(|map| map.is_empty())
    }

    pub fn stats(&self) -> BufferStats {
        let maps = self.partitions.lock();
        let per_partition: Vec<_> = Partition::ALL
            .iter()
            .map(|partition| (*partition, maps[partition.index()].len()))
            .collect();
        let total_keys = per_partition.iter().map(|(_, n)| n).sum();
        BufferStats {
            per_partition,
            total_keys,
        }
    }
}
