//! Game server regions. Each region keeps its own independent price tables.

use crate::common::errors::{normalize, ParseError};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Game server region
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
pub enum Region {
    #[serde(rename = "eu")]
    Europe = 0,
    #[serde(rename = "us")]
    Americas = 1,
    #[serde(rename = "as")]
    Asia = 2,
}

impl Region {
    /// Every served region, in discriminant order
    pub const ALL: [Region; 3] = [Region::Europe, Region::Americas, Region::Asia];

    /// Canonical short code used in selectors and table names
    pub fn slug(&self) -> &'static str {
        match self {
            Region::Europe => "eu",
            Region::Americas => "us",
            Region::Asia => "as",
        }
    }

    /// Dense index in `0..Region::ALL.len()`
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Region {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "eu" | "europe" => Ok(Region::Europe),
            "us" | "americas" | "west" => Ok(Region::Americas),
            "as" | "asia" | "east" => Ok(Region::Asia),
            _ => Err(ParseError::UnknownRegion(s.to_string())),
        }
    }
}
