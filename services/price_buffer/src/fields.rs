//! # Field Transformer
//!
//! Turns one incoming price update into the sparse field set merged into the
//! buffer. Every price present in the update synthesizes a companion
//! "<city> updated at" timestamp carrying the time the update was *received*,
//! so freshness reflects what clients observed, not when the buffer flushed.
//!
//! Column names come from the static [`PRICE_COLUMNS`] table rather than
//! string manipulation of field names.
//!
//! ```text
//! {"unique_name": "T4_SWORD", "price_caerleon": 1000}
//!     → key "T4_SWORD"
//!     → { caerleon: Some(1000) } + { caerleon_updated_at: received_at }
//! ```

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use types::City;

/// Name of the entity key field in update payloads and tables
pub const ENTITY_KEY_FIELD: &str = "unique_name";

/// Price column and its companion freshness column for one city
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceColumn {
    pub city: City,
    pub price: &'static str,
    pub updated_at: &'static str,
}

/// Column pairs for every city, indexed by `City` discriminant
pub static PRICE_COLUMNS: [PriceColumn; 8] = [
    PriceColumn {
        city: City::BlackMarket,
        price: "price_black_market",
        updated_at: "black_market_updated_at",
    },
    PriceColumn {
        city: City::Caerleon,
        price: "price_caerleon",
        updated_at: "caerleon_updated_at",
    },
    PriceColumn {
        city: City::Lymhurst,
        price: "price_lymhurst",
        updated_at: "lymhurst_updated_at",
    },
    PriceColumn {
        city: City::Bridgewatch,
        price: "price_bridgewatch",
        updated_at: "bridgewatch_updated_at",
    },
    PriceColumn {
        city: City::FortSterling,
        price: "price_fort_sterling",
        updated_at: "fort_sterling_updated_at",
    },
    PriceColumn {
        city: City::Thetford,
        price: "price_thetford",
        updated_at: "thetford_updated_at",
    },
    PriceColumn {
        city: City::Martlock,
        price: "price_martlock",
        updated_at: "martlock_updated_at",
    },
    PriceColumn {
        city: City::Brecilien,
        price: "price_brecilien",
        updated_at: "brecilien_updated_at",
    },
];

static BY_PRICE_NAME: Lazy<HashMap<&'static str, &'static PriceColumn>> =
    Lazy::new(|| PRICE_COLUMNS.iter().map(|column| (column.price, column)).collect());

impl PriceColumn {
    pub fn for_city(city: City) -> &'static PriceColumn {
        &PRICE_COLUMNS[city as usize]
    }

    /// Look up a payload field name such as `price_caerleon`
    pub fn by_price_name(name: &str) -> Option<&'static PriceColumn> {
        BY_PRICE_NAME.get(name).copied()
    }
}

/// A price field carried a value that is neither an integer nor null
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{column} must be an integer or null, got {value}")]
pub struct InvalidPriceField {
    pub column: String,
    pub value: String,
}

/// One client-submitted price update for a single item.
///
/// `prices` is sparse: a city absent from the map was not sent at all, while
/// `Some(None)` is an explicit `null` that clears the stored price.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawItemPriceUpdate")]
pub struct ItemPriceUpdate {
    pub unique_name: String,
    pub prices: BTreeMap<City, Option<i64>>,
}

impl ItemPriceUpdate {
    pub fn new(unique_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            prices: BTreeMap::new(),
        }
    }

    pub fn with_price(mut self, city: City, price: i64) -> Self {
        self.prices.insert(city, Some(price));
        self
    }

    /// Mark the city's price as explicitly null
    pub fn with_cleared_price(mut self, city: City) -> Self {
        self.prices.insert(city, None);
        self
    }
}

#[derive(Deserialize)]
struct RawItemPriceUpdate {
    unique_name: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl TryFrom<RawItemPriceUpdate> for ItemPriceUpdate {
    type Error = InvalidPriceField;

    fn try_from(raw: RawItemPriceUpdate) -> Result<Self, Self::Error> {
        let mut prices = BTreeMap::new();

        // Fields that are not price columns are ignored
        for (name, value) in raw.fields {
            let Some(column) = PriceColumn::by_price_name(&name) else {
                continue;
            };
            prices.insert(column.city, price_value(column, &value)?);
        }

        Ok(Self {
            unique_name: raw.unique_name,
            prices,
        })
    }
}

fn price_value(column: &PriceColumn, value: &Value) -> Result<Option<i64>, InvalidPriceField> {
    let invalid = || InvalidPriceField {
        column: column.price.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Ok(Some(int));
            }
            // Integral floats such as 1000.0. `i64::MAX as f64` rounds up to 2^63,
            // which is out of range, hence the strict upper bound.
            match number.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(Some(f as i64))
                }
                _ => Err(invalid()),
            }
        }
        _ => Err(invalid()),
    }
}

/// Pending (not yet persisted) field values for one entity key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFields {
    prices: BTreeMap<City, Option<i64>>,
    price_updated_at: BTreeMap<City, DateTime<Utc>>,
}

impl PendingFields {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Number of pending price fields
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// `None` if the city is not pending; `Some(None)` if it is pending as null
    pub fn price(&self, city: City) -> Option<Option<i64>> {
        self.prices.get(&city).copied()
    }

    pub fn price_updated_at(&self, city: City) -> Option<DateTime<Utc>> {
        self.price_updated_at.get(&city).copied()
    }

    pub fn cities(&self) -> impl Iterator<Item = City> + '_ {
        self.prices.keys().copied()
    }

    /// Field-level last-writer-wins merge: every field present in `newer`
    /// replaces the pending value, every other field is kept.
    pub fn merge(&mut self, newer: PendingFields) {
        self.prices.extend(newer.prices);
        self.price_updated_at.extend(newer.price_updated_at);
    }

    pub fn into_parts(self) -> (BTreeMap<City, Option<i64>>, BTreeMap<City, DateTime<Utc>>) {
        (self.prices, self.price_updated_at)
    }
}

/// Split an update into its entity key and augmented field set.
///
/// Returns `None` when nothing is left to merge: no price fields at all, or a
/// blank entity key.
pub fn augment(
    update: ItemPriceUpdate,
    received_at: DateTime<Utc>,
) -> Option<(String, PendingFields)> {
    let ItemPriceUpdate { unique_name, prices } = update;

    if prices.is_empty() || unique_name.trim().is_empty() {
        return None;
    }

    let price_updated_at = prices.keys().map(|city| (*city, received_at)).collect();

    Some((
        unique_name,
        PendingFields {
            prices,
            price_updated_at,
        },
    ))
}
