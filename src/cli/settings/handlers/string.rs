//! Text and URL setting handlers.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config_with_message, success_set};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;
use crate::utils::url::validate_base_url;

/// Data-driven handler for free-text and URL settings.
pub struct TextHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    /// Trims and checks the value as an HTTP(S) base URL before storing.
    url: bool,
    default_display: fn() -> String,
    get: fn(&Config) -> Option<&String>,
    set_field: fn(&mut Config, Option<String>),
}

impl SettingHandler for TextHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        let mut value = args.join(" ");
        if self.url {
            value = validate_base_url(&value).map_err(SettingError::InvalidUrl)?;
        }
        let display = truncate_with_ellipsis(&value, 50);
        let set_field = self.set_field;

        mutate_config_with_message(
            ctx.config_path,
            move |config| {
                set_field(config, Some(value));
                Ok(())
            },
            success_set(self.key, &display),
        )
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config_with_message(
            ctx.config_path,
            move |config| {
                set_field(config, None);
                Ok(())
            },
            format!(
                "✅ Unset {} (will use default: {})",
                self.key,
                (self.default_display)()
            ),
        )
    }

    fn format(&self, config: &Config) -> String {
        match (self.get)(config) {
            Some(value) => {
                let flat = value.replace('\n', " ");
                format!("  {}: {}", self.key, truncate_with_ellipsis(&flat, 50))
            }
            None => format!(
                "  {}: (unset, default: {})",
                self.key,
                (self.default_display)()
            ),
        }
    }
}

/// Truncate a string to `max_chars` characters, appending "..." if truncated.
fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

pub fn base_url_handler() -> TextHandler {
    TextHandler {
        key: "base-url",
        hint: "To set the chat endpoint, provide an http(s) URL:",
        example: "blendchat set base-url https://openrouter.ai/api/v1",
        url: true,
        default_display: || Config::default().base_url().to_string(),
        get: |c| c.base_url.as_ref(),
        set_field: |c, v| c.base_url = v,
    }
}

pub fn articles_base_url_handler() -> TextHandler {
    TextHandler {
        key: "articles-base-url",
        hint: "To set the news endpoint, provide an http(s) URL:",
        example: "blendchat set articles-base-url https://api.spaceflightnewsapi.net/v4",
        url: true,
        default_display: || Config::default().articles_base_url().to_string(),
        get: |c| c.articles_base_url.as_ref(),
        set_field: |c, v| c.articles_base_url = v,
    }
}

pub fn app_title_handler() -> TextHandler {
    TextHandler {
        key: "app-title",
        hint: "To set the title sent with each request, provide the text:",
        example: "blendchat set app-title \"My Chat\"",
        url: false,
        default_display: || Config::default().app_title().unwrap_or_default().to_string(),
        get: |c| c.app_title.as_ref(),
        set_field: |c, v| c.app_title = v,
    }
}

pub fn referer_handler() -> TextHandler {
    TextHandler {
        key: "referer",
        hint: "To set the referer sent with each request, provide a URL:",
        example: "blendchat set referer https://example.com",
        url: false,
        default_display: || "none".to_string(),
        get: |c| c.referer.as_ref(),
        set_field: |c, v| c.referer = v,
    }
}
