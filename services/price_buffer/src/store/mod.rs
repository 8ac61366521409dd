//! # Persistence Contract
//!
//! The flush coordinator persists through two traits:
//!
//! - [`PriceStore`] opens a transaction
//! - [`StoreTransaction`] offers update-by-key and insert, and is finished
//!   exactly once with `commit` or `rollback`
//!
//! Upsert is expressed on top of those two primitives: update the row matching
//! the key, and insert a new one when nothing matched.
//!
//! The relational engine itself lives outside this crate; [`MemoryStore`]
//! implements the contract in memory for tests and local runs.

pub mod memory;

use crate::error::StoreError;
use crate::fields::{PendingFields, PriceColumn};
use crate::router::PriceTable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use types::City;

pub use memory::{MemoryStore, PersistedRow};

/// Column values written for one entity key in one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChanges {
    /// `price_<city>` columns; `None` writes NULL
    pub prices: BTreeMap<City, Option<i64>>,
    /// `<city>_updated_at` columns
    pub price_updated_at: BTreeMap<City, DateTime<Utc>>,
    /// Row-level `updated_at`
    pub updated_at: DateTime<Utc>,
}

impl RowChanges {
    pub fn from_pending(fields: PendingFields, updated_at: DateTime<Utc>) -> Self {
        let (prices, price_updated_at) = fields.into_parts();
        Self {
            prices,
            price_updated_at,
            updated_at,
        }
    }

    /// Columns this write sets, as named in the partition table
    pub fn column_names(&self) -> Vec<&'static str> {
        let mut columns: Vec<_> = self
            .prices
            .keys()
            .map(|city| PriceColumn::for_city(*city).price)
            .collect();
        columns.extend(
            self.price_updated_at
                .keys()
                .map(|city| PriceColumn::for_city(*city).updated_at),
        );
        columns.push("updated_at");
        columns
    }
}

/// Which branch of the upsert ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Updated,
    Inserted,
}

/// A transactional store holding one table per partition
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Open a transaction; every write of one flush goes through it
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// One open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Update the row with this key; returns the number of rows affected
    async fn update_row(
        &mut self,
        table: PriceTable,
        key: &str,
        changes: &RowChanges,
    ) -> Result<u64, StoreError>;

    /// Insert a new row carrying the key and the changes
    async fn insert_row(
        &mut self,
        table: PriceTable,
        key: &str,
        changes: &RowChanges,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;

    /// Update if present, otherwise insert
    async fn upsert_row(
        &mut self,
        table: PriceTable,
        key: &str,
        changes: &RowChanges,
    ) -> Result<UpsertKind, StoreError> {
        if self.update_row(table, key, changes).await? > 0 {
            return Ok(UpsertKind::Updated);
        }
        self.insert_row(table, key, changes).await?;
        Ok(UpsertKind::Inserted)
    }
}
