use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::api::articles::DEFAULT_ARTICLES_BASE_URL;
use crate::core::chat::DEFAULT_CONTEXT_WINDOW;
use crate::core::models::{ModelDescriptor, ModelRegistry};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_APP_TITLE: &str = "Blend AI Chat";

/// Contents of `config.toml`. Unset fields fall back to the defaults exposed
/// by the accessor methods.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// OpenAI-compatible endpoint root
    pub base_url: Option<String>,
    pub articles_base_url: Option<String>,
    /// Model used when no selection has been stored yet
    pub default_model: Option<String>,
    /// Number of earlier messages sent along with each prompt
    pub context_window: Option<usize>,
    pub stream: Option<bool>,
    /// Show the thinking animation while waiting for a reply
    pub thinking: Option<bool>,
    /// Sent as `X-Title`
    pub app_title: Option<String>,
    /// Sent as `HTTP-Referer`
    pub referer: Option<String>,
    #[serde(default)]
    pub custom_models: Vec<ModelDescriptor>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn articles_base_url(&self) -> &str {
        self.articles_base_url
            .as_deref()
            .unwrap_or(DEFAULT_ARTICLES_BASE_URL)
    }

    pub fn context_window(&self) -> usize {
        self.context_window.unwrap_or(DEFAULT_CONTEXT_WINDOW)
    }

    pub fn stream_enabled(&self) -> bool {
        self.stream.unwrap_or(true)
    }

    pub fn thinking_enabled(&self) -> bool {
        self.thinking.unwrap_or(true)
    }

    pub fn app_title(&self) -> Option<&str> {
        match self.app_title.as_deref() {
            Some(title) => Some(title).filter(|t| !t.is_empty()),
            None => Some(DEFAULT_APP_TITLE),
        }
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref().filter(|r| !r.is_empty())
    }

    /// Built-in catalog plus `custom_models`, with `default_model` applied.
    /// A default that names no known model is ignored with a warning.
    pub fn model_registry(&self) -> ModelRegistry {
        let registry = ModelRegistry::builtin().with_models(self.custom_models.clone());
        match self.default_model.as_deref() {
            Some(id) => match registry.clone().with_default(id) {
                Ok(registry) => registry,
                Err(err) => {
                    warn!("Ignoring default_model: {err}");
                    registry
                }
            },
            None => registry,
        }
    }
}
