//! In-memory transactional store
//!
//! Writes are staged per transaction and applied to the shared tables under one
//! write lock at commit; rollback (or drop) discards them. Readers only ever see
//! committed rows.
//!
//! Failure injection hooks (`set_offline`, `fail_after`, `fail_next_commit`)
//! drive the rollback paths of the flush coordinator in tests.

use super::{PriceStore, RowChanges, StoreTransaction};
use crate::error::StoreError;
use crate::router::PriceTable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use types::City;

/// A committed row as the relational store would hold it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRow {
    pub unique_name: String,
    pub prices: BTreeMap<City, Option<i64>>,
    pub price_updated_at: BTreeMap<City, DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PersistedRow {
    pub fn new(unique_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            prices: BTreeMap::new(),
            price_updated_at: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Stored price, `None` when the column is NULL or was never written
    pub fn price(&self, city: City) -> Option<i64> {
        self.prices.get(&city).copied().flatten()
    }

    pub fn price_updated_at(&self, city: City) -> Option<DateTime<Utc>> {
        self.price_updated_at.get(&city).copied()
    }

    /// Apply a committed write. A city whose stored `<city>_updated_at` is
    /// newer than the incoming one keeps its stored value, so a stale snapshot
    /// committing late cannot roll prices back.
    fn apply(&mut self, changes: &RowChanges) {
        for (city, price) in &changes.prices {
            let incoming = changes.price_updated_at.get(city).copied();
            if let (Some(incoming), Some(stored)) = (incoming, self.price_updated_at(*city)) {
                if incoming < stored {
                    continue;
                }
            }
            self.prices.insert(*city, *price);
            if let Some(at) = incoming {
                self.price_updated_at.insert(*city, at);
            }
        }
        self.updated_at = self.updated_at.max(Some(changes.updated_at));
    }
}

/// Operation counters, for asserting what a flush did to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub begins: u64,
    pub writes: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

type Tables = HashMap<PriceTable, HashMap<String, PersistedRow>>;

#[derive(Default)]
struct MemoryInner {
    tables: RwLock<Tables>,
    offline: AtomicBool,
    /// Absolute write number that fails; 0 disables injection
    fail_on_write: AtomicU64,
    fail_commit: AtomicBool,
    begins: AtomicU64,
    writes: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl MemoryInner {
    fn exists(&self, table: PriceTable, key: &str) -> bool {
        self.tables
            .read()
            .get(&table)
            .map_or(false, |rows| rows.contains_key(key))
    }

    fn check_write(&self) -> Result<(), StoreError> {
        let n = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if self.offline.load(Ordering::Relaxed) {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        let target = self.fail_on_write.load(Ordering::Relaxed);
        if target != 0 && n == target {
            self.fail_on_write.store(0, Ordering::Relaxed);
            return Err(StoreError::Injected(n));
        }
        Ok(())
    }
}

/// Transactional in-memory implementation of [`PriceStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a committed row directly, bypassing transactions
    pub fn seed_row(&self, table: PriceTable, row: PersistedRow) {
        self.inner
            .tables
            .write()
            .entry(table)
            .or_default()
            .insert(row.unique_name.clone(), row);
    }

    pub fn row(&self, table: PriceTable, key: &str) -> Option<PersistedRow> {
        self.inner
            .tables
            .read()
            .get(&table)
            .and_then(|rows| rows.get(key).cloned())
    }

    /// All committed rows of a table, ordered by key
    pub fn rows(&self, table: PriceTable) -> Vec<PersistedRow> {
        let mut rows: Vec<_> = self
            .inner
            .tables
            .read()
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| a.unique_name.cmp(&b.unique_name));
        rows
    }

    pub fn row_count(&self, table: PriceTable) -> usize {
        self.inner.tables.read().get(&table).map_or(0, |rows| rows.len())
    }

    /// While offline, `begin` and every write fail with a connection error
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Relaxed);
    }

    /// Make the `n`-th write from now fail (1 = the next write)
    pub fn fail_after(&self, n: u64) {
        let current = self.inner.writes.load(Ordering::Relaxed);
        self.inner.fail_on_write.store(current + n.max(1), Ordering::Relaxed);
    }

    pub fn fail_next_commit(&self) {
        self.inner.fail_commit.store(true, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            begins: self.inner.begins.load(Ordering::Relaxed),
            writes: self.inner.writes.load(Ordering::Relaxed),
            commits: self.inner.commits.load(Ordering::Relaxed),
            rollbacks: self.inner.rollbacks.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.inner.begins.fetch_add(1, Ordering::Relaxed);
        if self.inner.offline.load(Ordering::Relaxed) {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        Ok(Box::new(MemoryTransaction {
            inner: self.inner.clone(),
            staged: Vec::new(),
            inserted: HashSet::new(),
        }))
    }
}

struct MemoryTransaction {
    inner: Arc<MemoryInner>,
    /// Writes in issue order, replayed at commit
    staged: Vec<(PriceTable, String, RowChanges)>,
    /// Keys inserted by this transaction and not yet committed
    inserted: HashSet<(PriceTable, String)>,
}

impl MemoryTransaction {
    fn exists(&self, table: PriceTable, key: &str) -> bool {
        self.inserted.contains(&(table, key.to_string())) || self.inner.exists(table, key)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn update_row(
        &mut self,
        table: PriceTable,
        key: &str,
        changes: &RowChanges,
    ) -> Result<u64, StoreError> {
        self.inner.check_write()?;
        if !self.exists(table, key) {
            return Ok(0);
        }
        debug!(%table, key, columns = ?changes.column_names(), "staged row update");
        self.staged.push((table, key.to_string(), changes.clone()));
        Ok(1)
    }

    async fn insert_row(
        &mut self,
        table: PriceTable,
        key: &str,
        changes: &RowChanges,
    ) -> Result<(), StoreError> {
        self.inner.check_write()?;
        if key.trim().is_empty() {
            return Err(StoreError::Constraint {
                table,
                reason: "unique_name must not be empty".to_string(),
            });
        }
        if self.exists(table, key) {
            return Err(StoreError::DuplicateKey {
                table,
                key: key.to_string(),
            });
        }
        debug!(%table, key, columns = ?changes.column_names(), "staged row insert");
        self.inserted.insert((table, key.to_string()));
        self.staged.push((table, key.to_string(), changes.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.inner.fail_commit.swap(false, Ordering::Relaxed) {
            self.inner.rollbacks.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::Connection("connection lost during commit".to_string()));
        }

        let staged = self.staged.len();
        {
            let mut tables = self.inner.tables.write();
            for (table, key, changes) in &self.staged {
                tables
                    .entry(*table)
                    .or_default()
                    .entry(key.clone())
                    .or_insert_with(|| PersistedRow::new(key.clone()))
                    .apply(changes);
            }
        }
        self.inner.commits.fetch_add(1, Ordering::Relaxed);
        debug!(writes = staged, "memory store transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollbacks.fetch_add(1, Ordering::Relaxed);
        debug!(
            discarded = self.staged.len(),
            "memory store transaction rolled back"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UpsertKind;

    fn changes(city: City, price: i64) -> RowChanges {
        let now = Utc::now();
        RowChanges {
            prices: BTreeMap::from([(city, Some(price))]),
            price_updated_at: BTreeMap::from([(city, now)]),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemFastEu;

        let mut tx = store.begin().await.unwrap();
        tx.insert_row(table, "T4_SWORD", &changes(City::Caerleon, 1000))
            .await
            .unwrap();
        assert!(store.row(table, "T4_SWORD").is_none());

        tx.commit().await.unwrap();
        let row = store.row(table, "T4_SWORD").unwrap();
        assert_eq!(row.price(City::Caerleon), Some(1000));
        assert!(row.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemOrderUs;

        let mut tx = store.begin().await.unwrap();
        tx.insert_row(table, "T6_AXE", &changes(City::Thetford, 7))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.row_count(table), 0);
        assert_eq!(store.stats().rollbacks, 1);
        assert_eq!(store.stats().commits, 0);
    }

    #[tokio::test]
    async fn test_update_sees_rows_inserted_in_same_transaction() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemFastAs;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.update_row(table, "T4_BOW", &changes(City::Lymhurst, 1)).await.unwrap(),
            0
        );
        tx.insert_row(table, "T4_BOW", &changes(City::Lymhurst, 1))
            .await
            .unwrap();
        assert_eq!(
            tx.update_row(table, "T4_BOW", &changes(City::Martlock, 2)).await.unwrap(),
            1
        );
        tx.commit().await.unwrap();

        let row = store.row(table, "T4_BOW").unwrap();
        assert_eq!(row.price(City::Lymhurst), Some(1));
        assert_eq!(row.price(City::Martlock), Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_and_empty_keys_rejected() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemFastEu;
        store.seed_row(table, PersistedRow::new("T4_SWORD"));

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .insert_row(table, "T4_SWORD", &changes(City::Caerleon, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        let err = tx
            .insert_row(table, "", &changes(City::Caerleon, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }));
    }

    #[tokio::test]
    async fn test_upsert_updates_then_inserts() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemOrderEu;
        store.seed_row(table, PersistedRow::new("T4_SWORD"));

        let mut tx = store.begin().await.unwrap();
        let existing = tx
            .upsert_row(table, "T4_SWORD", &changes(City::Caerleon, 1))
            .await
            .unwrap();
        let fresh = tx
            .upsert_row(table, "T5_SWORD", &changes(City::Caerleon, 2))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(existing, UpsertKind::Updated);
        assert_eq!(fresh, UpsertKind::Inserted);
        assert_eq!(store.row_count(table), 2);
    }

    #[tokio::test]
    async fn test_late_stale_commit_keeps_newer_prices() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemFastEu;
        store.seed_row(table, PersistedRow::new("T4_SWORD"));

        let older = Utc::now();
        let newer = older + chrono::Duration::seconds(5);
        let stale = RowChanges {
            prices: BTreeMap::from([(City::Caerleon, Some(100)), (City::Martlock, Some(200))]),
            price_updated_at: BTreeMap::from([(City::Caerleon, older), (City::Martlock, older)]),
            updated_at: older,
        };
        let fresh = RowChanges {
            prices: BTreeMap::from([(City::Caerleon, Some(150))]),
            price_updated_at: BTreeMap::from([(City::Caerleon, newer)]),
            updated_at: newer,
        };

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.update_row(table, "T4_SWORD", &stale).await.unwrap();
        second.update_row(table, "T4_SWORD", &fresh).await.unwrap();

        // The newer write commits before the older one
        second.commit().await.unwrap();
        first.commit().await.unwrap();

        let row = store.row(table, "T4_SWORD").unwrap();
        assert_eq!(row.price(City::Caerleon), Some(150));
        assert_eq!(row.price_updated_at(City::Caerleon), Some(newer));
        // Cities only the older write touched still land
        assert_eq!(row.price(City::Martlock), Some(200));
        assert_eq!(row.updated_at, Some(newer));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        let table = PriceTable::ItemFastEu;

        store.fail_after(2);
        let mut tx = store.begin().await.unwrap();
        tx.insert_row(table, "A", &changes(City::Caerleon, 1))
            .await
            .unwrap();
        let err = tx
            .insert_row(table, "B", &changes(City::Caerleon, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Injected(_)));

        // Injection is one-shot
        tx.insert_row(table, "C", &changes(City::Caerleon, 1))
            .await
            .unwrap();

        store.set_offline(true);
        assert!(matches!(
            store.begin().await,
            Err(StoreError::Connection(_))
        ));
    }
}
