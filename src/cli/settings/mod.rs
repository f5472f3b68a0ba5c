//! Settings management for CLI set/unset commands.
//!
//! Each configuration key has a handler:
//!
//! - URL settings (`base-url`, `articles-base-url`)
//! - Boolean settings (`stream`, `thinking`)
//! - Text settings (`app-title`, `referer`)
//! - `default-model`, checked against the model catalog
//! - `context-window`, a non-negative integer

pub mod error;
pub mod handlers;
pub mod helpers;
pub mod registry;

pub use error::SettingError;
pub use registry::SettingRegistry;

use std::path::Path;

use crate::core::config::data::Config;

/// Context provided to setting handlers during set/unset operations.
pub struct SetContext<'a> {
    /// Snapshot used for validation; handlers write through `config_path`.
    pub config: &'a Config,
    pub config_path: &'a Path,
}

/// Trait for handling a configuration setting.
///
/// Each implementation handles a specific configuration key,
/// providing set, unset, and format operations.
pub trait SettingHandler: Send + Sync {
    /// Returns the configuration key this handler manages.
    fn key(&self) -> &'static str;

    /// Set the configuration value from the words after the key.
    ///
    /// # Returns
    /// A success message to display, or an error.
    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// Unset (clear) the configuration value.
    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// Format the current value for display in `blendchat set` output.
    fn format(&self, config: &Config) -> String;
}
