//! Shared setup for subcommands: config, storage and HTTP clients.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::api::articles::ArticleClient;
use crate::api::completion::{CompletionBackend, CompletionClient};
use crate::core::chat::ChatController;
use crate::core::config::data::{path_display, Config};
use crate::core::storage::{FileStore, MemoryStore, SharedStore};

use super::Args;

pub struct CliContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub storage: SharedStore,
    http: reqwest::Client,
    model_override: Option<String>,
    no_stream: bool,
}

impl CliContext {
    pub fn load(args: &Args) -> Result<Self, Box<dyn Error>> {
        let config_path = Config::get_config_path()?;
        let config = Config::load_from_path(&config_path)?;

        let storage: SharedStore = if args.ephemeral {
            debug!("using in-memory storage");
            MemoryStore::shared()
        } else {
            let data_dir = match &args.data_dir {
                Some(dir) => dir.clone(),
                None => Config::default_data_dir()?,
            };
            debug!(data_dir = %path_display(&data_dir), "using file storage");
            Arc::new(FileStore::new(data_dir))
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("blendchat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            config_path,
            storage,
            http,
            model_override: args.model.clone().filter(|m| !m.trim().is_empty()),
            no_stream: args.no_stream,
        })
    }

    /// Controller over the stored sessions, with `-m` applied. The model
    /// given with `-m` is remembered like any other selection.
    pub fn chat_controller(&self) -> Result<ChatController, Box<dyn Error>> {
        let mut controller =
            ChatController::new(self.storage.clone(), self.config.model_registry())
                .with_context_window(self.config.context_window())
                .with_streaming(self.stream_enabled());

        if let Some(model) = &self.model_override {
            if controller.select_model(model).is_none() {
                return Err(format!(
                    "Unknown model: {model}. Run 'blendchat models' to list available models."
                )
                .into());
            }
        }
        Ok(controller)
    }

    pub fn stream_enabled(&self) -> bool {
        self.config.stream_enabled() && !self.no_stream
    }

    pub fn completion_backend(&self, api_key: &str) -> Arc<dyn CompletionBackend> {
        Arc::new(
            CompletionClient::new(self.http.clone(), self.config.base_url(), api_key)
                .with_attribution(
                    self.config.app_title().map(str::to_string),
                    self.config.referer().map(str::to_string),
                ),
        )
    }

    pub fn article_client(&self) -> ArticleClient {
        ArticleClient::new(self.http.clone(), self.config.articles_base_url())
    }
}
