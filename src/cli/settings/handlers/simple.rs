//! Simple setting handlers for single-value settings.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{
    mutate_config_with_message, success_set, success_unset, validate_model,
};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::chat::DEFAULT_CONTEXT_WINDOW;
use crate::core::config::data::Config;

/// Handler for the `default-model` setting.
pub struct DefaultModelHandler;

impl SettingHandler for DefaultModelHandler {
    fn key(&self) -> &'static str {
        "default-model"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: "To set a default model, specify the model id:",
                example: "blendchat set default-model anthropic/claude-3-haiku",
            });
        }

        let model = validate_model(ctx.config, args.join(" ").trim())?;
        let message = success_set("default-model", &model);

        mutate_config_with_message(
            ctx.config_path,
            move |config| {
                config.default_model = Some(model);
                Ok(())
            },
            message,
        )
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        mutate_config_with_message(
            ctx.config_path,
            |config| {
                config.default_model = None;
                Ok(())
            },
            success_unset("default-model"),
        )
    }

    fn format(&self, config: &Config) -> String {
        match &config.default_model {
            Some(model) => format!("  default-model: {model}"),
            None => format!(
                "  default-model: (unset, default: {})",
                config.model_registry().default_model().id
            ),
        }
    }
}

/// Handler for the `context-window` setting.
pub struct ContextWindowHandler;

impl SettingHandler for ContextWindowHandler {
    fn key(&self) -> &'static str {
        "context-window"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let Some(input) = args.first() else {
            return Err(SettingError::MissingArgs {
                hint: "To set how many earlier messages are sent, specify a number:",
                example: "blendchat set context-window 20",
            });
        };

        let value: usize = input
            .trim()
            .parse()
            .map_err(|_| SettingError::InvalidNumber(input.clone()))?;
        let message = success_set("context-window", &value.to_string());

        mutate_config_with_message(
            ctx.config_path,
            move |config| {
                config.context_window = Some(value);
                Ok(())
            },
            message,
        )
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        mutate_config_with_message(
            ctx.config_path,
            |config| {
                config.context_window = None;
                Ok(())
            },
            format!("✅ Unset context-window (will use default: {DEFAULT_CONTEXT_WINDOW})"),
        )
    }

    fn format(&self, config: &Config) -> String {
        match config.context_window {
            Some(value) => format!("  context-window: {value}"),
            None => format!("  context-window: (unset, default: {DEFAULT_CONTEXT_WINDOW})"),
        }
    }
}
