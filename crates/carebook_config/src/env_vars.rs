//! Environment variable naming for Carebook configuration.
//!
//! Configuration paths such as `scheduling.min_bookable_minutes` are overridden by
//! `CAREBOOK__SCHEDULING__MIN_BOOKABLE_MINUTES`. The prefix can be changed
//! through the `PREFIX` variable, matching what [`crate::load_config`] reads.

use std::env;

/// The default prefix for configuration environment variables
pub const DEFAULT_PREFIX: &str = "CAREBOOK";

/// The separator for configuration environment variables
pub const CONFIG_SEPARATOR: &str = "__";

/// Get the prefix for configuration environment variables
pub fn get_config_prefix() -> String {
    env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}
