//! # Market Types
//!
//! Identifiers shared by every service that touches the price feed.
//!
//! ## Design Philosophy
//!
//! - **Closed Sets**: regions, price kinds and market cities are finite enums, so
//!   routing decisions are exhaustive matches instead of string lookups
//! - **Stable Wire Names**: each identifier has one canonical lowercase slug used
//!   in JSON payloads, table names and column names
//! - **Lenient Parsing**: `FromStr` accepts the spellings clients actually send
//!   ("Fort Sterling", "fort_sterling", "EU", "europe")
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{City, PriceKind, Region};
//!
//! let city: City = "Fort Sterling".parse().unwrap();
//! assert_eq!(city.slug(), "fort_sterling");
//!
//! let region: Region = "EU".parse().unwrap();
//! assert_eq!(region, Region::Europe);
//!
//! let kind: PriceKind = "order".parse().unwrap();
//! assert_eq!(kind.slug(), "order");
//! ```

pub mod common;
pub mod market;

pub use common::errors::ParseError;
pub use market::{City, PriceKind, Region};
