//! Common helpers shared across market identifiers

pub mod errors;
