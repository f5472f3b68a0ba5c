//! Boolean setting handlers for on/off settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{format_bool, mutate_config, parse_bool};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;

/// Data-driven handler for boolean (on/off) settings.
pub struct BooleanHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    default_display: &'static str,
    get: fn(&Config) -> Option<bool>,
    set_field: fn(&mut Config, Option<bool>),
}

impl SettingHandler for BooleanHandler {
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

        let input = args.join(" ");
        let value = parse_bool(&input).ok_or(SettingError::InvalidBoolean(input))?;
        let display = format_bool(value);
        let set_field = self.set_field;
        let key = self.key;

        mutate_config(ctx.config_path, move |config| {
            set_field(config, Some(value));
            Ok(())
        })?;

        Ok(format!("✅ Set {key} to: {display}"))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let set_field = self.set_field;

        mutate_config(ctx.config_path, move |config| {
            set_field(config, None);
            Ok(())
        })?;

        Ok(format!(
            "✅ Unset {} (will use default: {})",
            self.key, self.default_display
        ))
    }

    fn format(&self, config: &Config) -> String {
        match (self.get)(config) {
            Some(value) => format!("  {}: {}", self.key, format_bool(value)),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

/// Create a handler for the `stream` setting.
pub fn stream_handler() -> BooleanHandler {
    BooleanHandler {
        key: "stream",
        hint: "To set streamed replies, specify on or off:",
        example: "blendchat set stream off",
        default_display: "on",
        get: |c| c.stream,
        set_field: |c, v| c.stream = v,
    }
}

/// Create a handler for the `thinking` setting.
pub fn thinking_handler() -> BooleanHandler {
    BooleanHandler {
        key: "thinking",
        hint: "To show or hide the thinking animation, specify on or off:",
        example: "blendchat set thinking off",
        default_display: "on",
        get: |c| c.thinking,
        set_field: |c, v| c.thinking = v,
    }
}
