//! Registry of setting handlers.

use std::collections::HashMap;

use super::handlers::{
    app_title_handler, articles_base_url_handler, base_url_handler, referer_handler,
    stream_handler, thinking_handler, ContextWindowHandler, DefaultModelHandler,
};
use super::SettingHandler;

/// Registry of all available setting handlers.
pub struct SettingRegistry {
    handlers: HashMap<&'static str, Box<dyn SettingHandler>>,
    /// Keys in display order for `blendchat set` output.
    display_order: Vec<&'static str>,
}

impl SettingRegistry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            display_order: Vec::new(),
        };

        // Register handlers in display order
        registry.register(Box::new(DefaultModelHandler));
        registry.register(Box::new(ContextWindowHandler));
        registry.register(Box::new(stream_handler()));
        registry.register(Box::new(thinking_handler()));
        registry.register(Box::new(base_url_handler()));
        registry.register(Box::new(articles_base_url_handler()));
        registry.register(Box::new(app_title_handler()));
        registry.register(Box::new(referer_handler()));

        registry
    }

    fn register(&mut self, handler: Box<dyn SettingHandler>) {
        let key = handler.key();
        self.display_order.push(key);
        self.handlers.insert(key, handler);
    }

    /// Get a handler by key.
    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    /// Get all keys in display order.
    pub fn keys_display_order(&self) -> &[&'static str] {
        &self.display_order
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
