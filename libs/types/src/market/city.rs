//! Market cities
//!
//! Every table that stores prices carries one price column and one freshness
//! column per city. The order of `City::ALL` is the column order.

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
#[serde(rename_all = "snake_case")]
pub enum City {
    BlackMarket = 0,
    Caerleon = 1,
    Lymhurst = 2,
    Bridgewatch = 3,
    FortSterling = 4,
    Thetford = 5,
    Martlock = 6,
    Brecilien = 7,
}

impl City {
    pub const ALL: [City; 8] = [
        City::BlackMarket,
        City::Caerleon,
        City::Lymhurst,
        City::Bridgewatch,
        City::FortSterling,
        City::Thetford,
        City::Martlock,
        City::Brecilien,
    ];

    /// Snake-case identifier, also the stem of the city's column names
    pub fn slug(&self) -> &'static str {
        match self {
            City::BlackMarket => "black_market",
            City::Caerleon => "caerleon",
            City::Lymhurst => "lymhurst",
            City::Bridgewatch => "bridgewatch",
            City::FortSterling => "fort_sterling",
            City::Thetford => "thetford",
            City::Martlock => "martlock",
            City::Brecilien => "brecilien",
        }
    }

    /// Name as shown in game
    pub fn display_name(&self) -> &'static str {
        match self {
            City::BlackMarket => "Black Market",
            City::Caerleon => "Caerleon",
            City::Lymhurst => "Lymhurst",
            City::Bridgewatch => "Bridgewatch",
            City::FortSterling => "Fort Sterling",
            City::Thetford => "Thetford",
            City::Martlock => "Martlock",
            City::Brecilien => "Brecilien",
        }
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for City {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slug = normalize(s);
        City::ALL
            .iter()
            .copied()
            .find(|city| city.slug() == slug)
            .ok_or_else(|| ParseError::UnknownCity(s.to_string()))
    }
}
