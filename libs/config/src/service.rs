//! Service defaults
//!
//! Default values and constants used by the price buffer service.

pub mod defaults {
    /// Base configuration file, relative to the working directory
    pub const CONFIG_PATH: &str = "config/price_buffer.toml";

    /// Directory holding per-environment overlay files (`<env>.toml`)
    pub const ENVIRONMENTS_DIR: &str = "config/environments";

    /// Prefix for environment variable overrides (`PRICE_BUFFER_FLUSH_INTERVAL_SECS`)
    pub const ENV_PREFIX: &str = "PRICE_BUFFER";

    /// Seconds between periodic flushes
    pub const FLUSH_INTERVAL_SECS: u64 = 60;

    /// Lower bound accepted for the flush interval
    pub const MIN_FLUSH_INTERVAL_SECS: u64 = 1;

    /// Default tracing filter directive
    pub const LOG_LEVEL: &str = "info";
}
