//! Price record kinds.
//!
//! `Fast` rows hold instant-sell prices that move with every trade; `Order` rows
//! hold the best standing order-book prices. They are stored in separate tables.

use crate::common::errors::{normalize, ParseError};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PriceKind {
    Fast = 0,
    Order = 1,
}

impl PriceKind {
    pub const ALL: [PriceKind; 2] = [PriceKind::Fast, PriceKind::Order];

    pub fn slug(&self) -> &'static str {
        match self {
            PriceKind::Fast => "fast",
            PriceKind::Order => "order",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for PriceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for PriceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "fast" => Ok(PriceKind::Fast),
            "order" => Ok(PriceKind::Order),
            _ => Err(ParseError::UnknownPriceKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("fast".parse::<PriceKind>().unwrap(), PriceKind::Fast);
        assert_eq!("ORDER".parse::<PriceKind>().unwrap(), PriceKind::Order);
        assert!("slow".parse::<PriceKind>().is_err());
    }
}
