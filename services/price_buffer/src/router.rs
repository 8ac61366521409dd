//! # Key Router
//!
//! Maps a caller-supplied `(region, kind)` selector onto one of the fixed buffer
//! partitions, and each partition onto its persistence table.
//!
//! ```text
//! {"region": "eu", "type": "fast"} → Partition(eu/fast) → PriceTable::ItemFastEu
//! {"region": "mars", ...}          → None (update dropped)
//! ```
//!
//! The router is a static lookup; it holds no state and its only failure mode is
//! "unknown selector", which resolves to `None`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use types::{ParseError, PriceKind, Region};

/// Partition selector exactly as the caller supplied it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSelector {
    pub region: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
}

impl PartitionSelector {
    pub fn new(region: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            kind: kind.into(),
        }
    }
}

impl From<Partition> for PartitionSelector {
    fn from(partition: Partition) -> Self {
        Self::new(partition.region.slug(), partition.kind.slug())
    }
}

impl std::fmt::Display for PartitionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.region, self.kind)
    }
}

/// One independent buffer bucket: a region paired with a price kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    pub region: Region,
    pub kind: PriceKind,
}

impl Partition {
    pub const COUNT: usize = Region::ALL.len() * PriceKind::ALL.len();

    /// Every partition, ordered by `index()`
    pub const ALL: [Partition; Partition::COUNT] = [
        Partition::new(Region::Europe, PriceKind::Fast),
        Partition::new(Region::Europe, PriceKind::Order),
        Partition::new(Region::Americas, PriceKind::Fast),
        Partition::new(Region::Americas, PriceKind::Order),
        Partition::new(Region::Asia, PriceKind::Fast),
        Partition::new(Region::Asia, PriceKind::Order),
    ];

    pub const fn new(region: Region, kind: PriceKind) -> Self {
        Self { region, kind }
    }

    /// Parse a raw selector, reporting which half was not recognized
    pub fn parse(selector: &PartitionSelector) -> Result<Self, ParseError> {
        let region = selector.region.parse::<Region>()?;
        let kind = selector.kind.parse::<PriceKind>()?;
        Ok(Self::new(region, kind))
    }

    /// Resolve a raw selector; unknown regions or kinds yield `None`
    pub fn resolve(selector: &PartitionSelector) -> Option<Self> {
        Self::parse(selector).ok()
    }

    /// Dense index in `0..Partition::COUNT`
    pub fn index(&self) -> usize {
        self.region.index() * PriceKind::ALL.len() + self.kind.index()
    }

    /// Persistence target for this partition
    pub fn table(&self) -> PriceTable {
        match (self.region, self.kind) {
            (Region::Europe, PriceKind::Fast) => PriceTable::ItemFastEu,
            (Region::Europe, PriceKind::Order) => PriceTable::ItemOrderEu,
            (Region::Americas, PriceKind::Fast) => PriceTable::ItemFastUs,
            (Region::Americas, PriceKind::Order) => PriceTable::ItemOrderUs,
            (Region::Asia, PriceKind::Fast) => PriceTable::ItemFastAs,
            (Region::Asia, PriceKind::Order) => PriceTable::ItemOrderAs,
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.region, self.kind)
    }
}

impl FromStr for Partition {
    type Err = ParseError;

    /// Accepts `eu/fast`, `eu:fast`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (region, kind) = s
            .split_once(&['/', ':'][..])
            .ok_or_else(|| ParseError::UnknownRegion(s.to_string()))?;
        Self::parse(&PartitionSelector::new(region, kind))
    }
}

/// Relational table holding the persisted rows of one partition.
/// All tables share the same row shape: `unique_name`, one price and one
/// freshness column per city, and a row-level `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceTable {
    ItemFastEu,
    ItemOrderEu,
    ItemFastUs,
    ItemOrderUs,
    ItemFastAs,
    ItemOrderAs,
}

impl PriceTable {
    pub fn name(&self) -> &'static str {
        match self {
            PriceTable::ItemFastEu => "item_fast_eu",
            PriceTable::ItemOrderEu => "item_order_eu",
            PriceTable::ItemFastUs => "item_fast_us",
            PriceTable::ItemOrderUs => "item_order_us",
            PriceTable::ItemFastAs => "item_fast_as",
            PriceTable::ItemOrderAs => "item_order_as",
        }
    }

    /// The partition this table persists
    pub fn partition(&self) -> Partition {
        match self {
            PriceTable::ItemFastEu => Partition::new(Region::Europe, PriceKind::Fast),
            PriceTable::ItemOrderEu => Partition::new(Region::Europe, PriceKind::Order),
            PriceTable::ItemFastUs => Partition::new(Region::Americas, PriceKind::Fast),
            PriceTable::ItemOrderUs => Partition::new(Region::Americas, PriceKind::Order),
            PriceTable::ItemFastAs => Partition::new(Region::Asia, PriceKind::Fast),
            PriceTable::ItemOrderAs => Partition::new(Region::Asia, PriceKind::Order),
        }
    }
}

impl std::fmt::Display for PriceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_resolve_known_selectors() {
        let partition = Partition::resolve(&PartitionSelector::new("eu", "fast")).unwrap();
        assert_eq!(partition, Partition::new(Region::Europe, PriceKind::Fast));
        assert_eq!(partition.table(), PriceTable::ItemFastEu);

        let partition = Partition::resolve(&PartitionSelector::new("AS", "order")).unwrap();
        assert_eq!(partition.table().name(), "item_order_as");
    }

    #[test]
    fn test_resolve_unknown_selectors() {
        assert!(Partition::resolve(&PartitionSelector::new("mars", "fast")).is_none());
        assert!(Partition::resolve(&PartitionSelector::new("eu", "slow")).is_none());
        assert!(Partition::resolve(&PartitionSelector::new("", "")).is_none());
    }

    #[test]
    fn test_index_is_dense_and_matches_all() {
        for (i, partition) in Partition::ALL.iter().enumerate() {
            assert_eq!(partition.index(), i);
        }
    }

    #[test]
    fn test_tables_are_distinct_and_invert() {
        let tables: HashSet<_> = Partition::ALL.iter().map(|p| p.table()).collect();
        assert_eq!(tables.len(), Partition::COUNT);

        for partition in Partition::ALL {
            assert_eq!(partition.table().partition(), partition);
        }
    }

    #[test]
    fn test_partition_from_str() {
        let partition: Partition = "us/order".parse().unwrap();
        assert_eq!(partition, Partition::new(Region::Americas, PriceKind::Order));
        assert_eq!(partition.to_string(), "us/order");
        assert!("us".parse::<Partition>().is_err());
    }

    #[test]
    fn test_selector_deserializes_type_or_kind() {
        let selector: PartitionSelector =
            serde_json::from_str(r#"{"region": "eu", "type": "fast"}"#).unwrap();
        assert_eq!(selector, PartitionSelector::new("eu", "fast"));

        let selector: PartitionSelector =
            serde_json::from_str(r#"{"region": "us", "kind": "order"}"#).unwrap();
        assert_eq!(selector, PartitionSelector::new("us", "order"));
    }
}
