//! # Price Buffer Configuration
//!
//! Centralized configuration for the price buffer service.
//!
//! ## Features
//!
//! - **Layered Loading**: built-in defaults, then a TOML file, then an optional
//!   environment overlay file, then `PRICE_BUFFER_*` environment variables
//! - **Service Defaults**: flush cadence, config paths and logging defaults in one place
//!
//! ## Usage
//!
//! ```rust,no_run
//! use service_config::{load_config, defaults};
//!
//! let config = load_config(None, Some("production")).unwrap();
//! assert!(config.flush_interval_secs >= defaults::MIN_FLUSH_INTERVAL_SECS);
//! ```

pub mod service;
pub mod service_config;

pub use service::defaults;
pub use service_config::{load_config, BufferServiceConfig, LogFormat};
