//! Bookmarked article ids, persisted as a JSON array.

use tracing::warn;

use crate::core::notice::Notice;
use crate::core::storage::{KeyValueStore, SharedStore, KEY_SAVED_ARTICLES};

pub struct SavedArticles {
    ids: Vec<String>,
    storage: SharedStore,
    notices: Vec<Notice>,
}

impl SavedArticles {
    /// Unreadable or malformed data is treated as an empty list.
    pub fn load(storage: SharedStore) -> Self {
        let ids = match storage.get(KEY_SAVED_ARTICLES) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|err| {
                warn!("Failed to parse saved articles: {err}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("Failed to read saved articles: {err}");
                Vec::new()
            }
        };
        Self {
            ids,
            storage,
            notices: Vec::new(),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.ids.iter().any(|saved| saved == id)
    }

    /// Add or remove `id`. Returns whether the article is saved afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        let saved = if self.is_saved(id) {
            self.ids.retain(|saved| saved != id);
            self.notices.push(Notice::info(
                "Article removed from bookmarks",
                "You can add it back anytime.",
            ));
            false
        } else {
            self.ids.push(id.to_string());
            self.notices.push(Notice::info(
                "Article saved to bookmarks",
                "You can find it in your saved articles.",
            ));
            true
        };
        self.persist();
        saved
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn persist(&self) {
        match serde_json::to_string(&self.ids) {
            Ok(json) => {
                if let Err(err) = self.storage.set(KEY_SAVED_ARTICLES, &json) {
                    warn!("Failed to persist saved articles: {err}");
                }
            }
            Err(err) => warn!("Failed to serialize saved articles: {err}"),
        }
    }
}
