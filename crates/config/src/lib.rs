//! Layered configuration for trawl.
//!
//! Values are merged, lowest priority first, from:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a configuration file (TOML, YAML or JSON, picked by extension),
//! 3. environment variables prefixed with `TRAWL_` (nested keys use `__`,
//!    e.g. `TRAWL_METRICS__FULL_POSIX=true`).

pub mod error;
mod settings;

pub use crate::settings::{Config, MetricsConfig};
