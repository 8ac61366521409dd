//! Error types for market identifier parsing

use thiserror::Error;

/// Errors that can occur while parsing a market identifier from client input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Region name is not one of the served regions
    #[error("Unknown region: '{0}'")]
    UnknownRegion(String),

    /// Price kind is neither "fast" nor "order"
    #[error("Unknown price kind: '{0}' (expected 'fast' or 'order')")]
    UnknownPriceKind(String),

    /// City name does not match any market location
    #[error("Unknown city: '{0}'")]
    UnknownCity(String),
}

/// Normalize client spelling to a slug: trimmed, lowercase, spaces and dashes as underscores
pub(crate) fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Fort Sterling "), "fort_sterling");
        assert_eq!(normalize("black-market"), "black_market");
        assert_eq!(normalize("EU"), "eu");
    }
}
