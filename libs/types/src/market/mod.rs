//! # Market Identifiers
//!
//! Closed identifier sets for the price feed:
//!
//! ```text
//! Region (3) × PriceKind (2) → one buffer partition / one persistence table
//! City (8)                   → one price column + one freshness column per table
//! ```

pub mod city;
pub mod kind;
pub mod region;

pub use city::City;
pub use kind::PriceKind;
pub use region::Region;
