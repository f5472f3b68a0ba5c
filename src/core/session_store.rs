//! The single owner of all chat sessions.
//!
//! Every mutation writes the full session list and the active session id
//! through to the key-value store before returning. Write failures are
//! logged and otherwise ignored: the in-memory state stays authoritative.

use std::error::Error as StdError;
use std::fmt;

use tracing::{debug, warn};

use crate::core::message::ChatMessage;
use crate::core::notice::Notice;
use crate::core::session::{derive_title, ChatSession};
use crate::core::storage::{KeyValueStore, SharedStore, KEY_ACTIVE_SESSION, KEY_SESSIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    UnknownSession(String),
    UnknownMessage {
        session_id: String,
        message_id: String,
    },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStoreError::UnknownSession(id) => write!(f, "no session with id {id}"),
            SessionStoreError::UnknownMessage {
                session_id,
                message_id,
            } => write!(f, "no message {message_id} in session {session_id}"),
        }
    }
}

impl StdError for SessionStoreError {}

pub struct SessionStore {
    sessions: Vec<ChatSession>,
    active_id: Option<String>,
    storage: SharedStore,
    notices: Vec<Notice>,
}

impl SessionStore {
    /// Restore sessions from `storage`.
    ///
    /// A missing or malformed session list yields a single fresh session.
    pub fn load(storage: SharedStore) -> Self {
        let sessions = match storage.get(KEY_SESSIONS) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ChatSession>>(&raw) {
                Ok(sessions) => dedup_sessions(sessions),
                Err(err) => {
                    warn!("Failed to parse stored sessions: {err}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("Failed to read stored sessions: {err}");
                Vec::new()
            }
        };

        let stored_active = storage.get(KEY_ACTIVE_SESSION).unwrap_or_else(|err| {
            warn!("Failed to read active session id: {err}");
            None
        });
        let active_id = stored_active
            .filter(|id| sessions.iter().any(|s| &s.id == id))
            .or_else(|| sessions.first().map(|s| s.id.clone()));

        let mut store = Self {
            sessions,
            active_id,
            storage,
            notices: Vec::new(),
        };

        if store.sessions.is_empty() {
            debug!("No sessions found, creating a new one");
            store.create_session();
        }
        store
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active_id.as_deref().and_then(|id| self.session(id))
    }

    /// Drain notices produced by earlier mutations.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn create_session(&mut self) -> String {
        let session = ChatSession::new();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = Some(id.clone());
        self.notices.push(Notice::info(
            "New conversation started",
            "You can now start chatting with the AI",
        ));
        self.persist();
        id
    }

    /// Activate `id`. Unknown ids leave the store untouched and return `false`.
    pub fn select_session(&mut self, id: &str) -> bool {
        if self.session(id).is_none() {
            debug!(session_id = id, "ignoring selection of unknown session");
            return false;
        }
        self.active_id = Some(id.to_string());
        self.persist();
        true
    }

    /// Remove `id`. If it was active, the most recently updated remaining
    /// session becomes active, or a fresh session is created.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };
        self.sessions.remove(index);

        if self.active_id.as_deref() == Some(id) {
            self.active_id = self
                .sessions
                .iter()
                .enumerate()
                // ties go to the session nearest the head of the list
                .max_by_key(|(i, s)| (s.updated_at, std::cmp::Reverse(*i)))
                .map(|(_, s)| s.id.clone());
        }

        self.notices.push(Notice::info(
            "Conversation deleted",
            "The conversation has been removed",
        ));

        if self.sessions.is_empty() {
            self.active_id = None;
            self.create_session();
        } else {
            self.persist();
        }
        true
    }

    pub fn append_user_message(
        &mut self,
        session_id: &str,
        text: &str,
    ) -> Result<String, SessionStoreError> {
        let session = self.session_mut(session_id)?;
        if session.messages.is_empty() {
            session.title = derive_title(text);
        }
        let message = ChatMessage::user(text);
        let message_id = message.id.clone();
        session.messages.push(message);
        session.touch();
        self.persist();
        Ok(message_id)
    }

    pub fn append_assistant_placeholder(
        &mut self,
        session_id: &str,
        model_id: &str,
    ) -> Result<String, SessionStoreError> {
        let session = self.session_mut(session_id)?;
        let message = ChatMessage::assistant_placeholder(model_id);
        let message_id = message.id.clone();
        session.messages.push(message);
        session.touch();
        self.persist();
        Ok(message_id)
    }

    pub fn mutate_message_content(
        &mut self,
        session_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), SessionStoreError> {
        let session = self.session_mut(session_id)?;
        let message =
            session
                .message_mut(message_id)
                .ok_or_else(|| SessionStoreError::UnknownMessage {
                    session_id: session_id.to_string(),
                    message_id: message_id.to_string(),
                })?;
        message.content.clear();
        message.content.push_str(content);
        session.touch();
        self.persist();
        Ok(())
    }

    pub fn clear_messages(&mut self, session_id: &str) -> Result<(), SessionStoreError> {
        let session = self.session_mut(session_id)?;
        session.messages.clear();
        session.touch();
        self.persist();
        Ok(())
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut ChatSession, SessionStoreError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SessionStoreError::UnknownSession(id.to_string()))
    }

    fn persist(&self) {
        match serde_json::to_string(&self.sessions) {
            Ok(json) => {
                if let Err(err) = self.storage.set(KEY_SESSIONS, &json) {
                    warn!("Failed to persist sessions: {err}");
                }
            }
            Err(err) => warn!("Failed to serialize sessions: {err}"),
        }

        let result = match &self.active_id {
            Some(id) => self.storage.set(KEY_ACTIVE_SESSION, id),
            None => self.storage.remove(KEY_ACTIVE_SESSION),
        };
        if let Err(err) = result {
            warn!("Failed to persist active session id: {err}");
        }
    }
}

fn dedup_sessions(sessions: Vec<ChatSession>) -> Vec<ChatSession> {
    let mut seen = std::collections::HashSet::new();
    let before = sessions.len();
    let unique: Vec<_> = sessions
        .into_iter()
        .filter(|s| seen.insert(s.id.clone()))
        .collect();
    if unique.len() != before {
        warn!(
            "Dropped {} stored sessions with duplicate ids",
            before - unique.len()
        );
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::core::session::DEFAULT_SESSION_TITLE;
    use crate::core::storage::{FileStore, MemoryStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn stored_sessions(storage: &SharedStore) -> Vec<ChatSession> {
        let raw = storage.get(KEY_SESSIONS).unwrap().expect("sessions stored");
        serde_json::from_str(&raw).unwrap()
    }

    fn assert_single_active(store: &SessionStore) {
        let active = store.active_session_id().expect("an active session");
        assert_eq!(
            store.sessions().iter().filter(|s| s.id == active).count(),
            1
        );
    }

    #[test]
    fn load_from_empty_storage_creates_one_active_session() {
        let storage = MemoryStore::shared();
        let mut store = SessionStore::load(storage.clone());

        assert_eq!(store.sessions().len(), 1);
        assert_single_active(&store);
        assert_eq!(store.active_session().unwrap().title, DEFAULT_SESSION_TITLE);
        assert_eq!(stored_sessions(&storage).len(), 1);
        assert_eq!(
            storage.get(KEY_ACTIVE_SESSION).unwrap().as_deref(),
            store.active_session_id()
        );
        assert_eq!(store.take_notices().len(), 1);
    }

    #[test]
    fn malformed_storage_falls_back_to_fresh_session() {
        let storage = MemoryStore::shared();
        storage.set(KEY_SESSIONS, "{not json").unwrap();

        let store = SessionStore::load(storage.clone());

        assert_eq!(store.sessions().len(), 1);
        assert!(store.active_session().unwrap().is_empty());
        assert_eq!(stored_sessions(&storage).len(), 1);
    }

    #[test]
    fn load_restores_stored_active_session() {
        let storage = MemoryStore::shared();
        let (first, second) = {
            let mut store = SessionStore::load(storage.clone());
            let first = store.active_session_id().unwrap().to_string();
            let second = store.create_session();
            assert!(store.select_session(&first));
            (first, second)
        };

        let store = SessionStore::load(storage);
        assert_eq!(store.active_session_id(), Some(first.as_str()));
        assert!(store.session(&second).is_some());
    }

    #[test]
    fn load_with_stale_active_id_activates_first_session() {
        let storage = MemoryStore::shared();
        {
            let mut store = SessionStore::load(storage.clone());
            store.create_session();
        }
        storage.set(KEY_ACTIVE_SESSION, "gone").unwrap();

        let store = SessionStore::load(storage);
        assert_eq!(
            store.active_session_id(),
            Some(store.sessions()[0].id.as_str())
        );
    }

    #[test]
    fn load_drops_duplicate_session_ids() {
        let storage = MemoryStore::shared();
        let session = ChatSession::new();
        let json = serde_json::to_string(&vec![session.clone(), session]).unwrap();
        storage.set(KEY_SESSIONS, &json).unwrap();

        let store = SessionStore::load(storage);
        assert_eq!(store.sessions().len(), 1);
    }

    #[test]
    fn create_session_inserts_at_head_and_activates() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let id = store.create_session();

        assert_eq!(store.sessions()[0].id, id);
        assert_eq!(store.active_session_id(), Some(id.as_str()));
        assert_eq!(store.sessions().len(), 2);
    }

    #[test]
    fn select_unknown_session_is_a_no_op() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let active = store.active_session_id().unwrap().to_string();

        assert!(!store.select_session("missing"));
        assert_eq!(store.active_session_id(), Some(active.as_str()));
    }

    #[test]
    fn deleting_active_session_promotes_most_recently_updated() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let oldest = store.active_session_id().unwrap().to_string();
        let middle = store.create_session();
        let newest = store.create_session();

        store.append_user_message(&oldest, "bump").unwrap();
        // Force a deterministic ordering of updated_at values.
        store.session_mut(&oldest).unwrap().updated_at = 3_000;
        store.session_mut(&middle).unwrap().updated_at = 2_000;
        store.session_mut(&newest).unwrap().updated_at = 1_000;

        assert!(store.select_session(&newest));
        assert!(store.delete_session(&newest));

        assert_eq!(store.active_session_id(), Some(oldest.as_str()));
        assert_single_active(&store);
    }

    #[test]
    fn deleting_inactive_session_keeps_active() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let first = store.active_session_id().unwrap().to_string();
        let second = store.create_session();

        assert!(store.delete_session(&first));
        assert_eq!(store.active_session_id(), Some(second.as_str()));
    }

    #[test]
    fn deleting_last_session_creates_a_fresh_one() {
        let mut store = SessionStore::load(MemoryStore::shared());
        store.take_notices();
        let only = store.active_session_id().unwrap().to_string();

        assert!(store.delete_session(&only));

        assert_eq!(store.sessions().len(), 1);
        assert_ne!(store.active_session_id(), Some(only.as_str()));
        assert_single_active(&store);

        let titles: Vec<_> = store.take_notices().into_iter().map(|n| n.title).collect();
        assert_eq!(
            titles,
            vec!["Conversation deleted", "New conversation started"]
        );
    }

    #[test]
    fn deleting_unknown_session_returns_false() {
        let mut store = SessionStore::load(MemoryStore::shared());
        assert!(!store.delete_session("missing"));
        assert_eq!(store.sessions().len(), 1);
    }

    #[test]
    fn active_invariant_holds_across_create_delete_sequences() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let mut ids = vec![store.active_session_id().unwrap().to_string()];

        for round in 0..12 {
            if round % 3 == 2 {
                let victim = ids.remove(round % ids.len());
                store.delete_session(&victim);
                ids = store.sessions().iter().map(|s| s.id.clone()).collect();
            } else {
                ids.push(store.create_session());
            }
            assert!(!store.sessions().is_empty());
            assert_single_active(&store);
        }
    }

    #[test]
    fn first_user_message_sets_title() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let id = store.active_session_id().unwrap().to_string();
        let text = "Explain quantum computing in simple terms that a 10-year-old could understand.";

        store.append_user_message(&id, text).unwrap();
        store.append_user_message(&id, "second").unwrap();

        let session = store.session(&id).unwrap();
        assert_eq!(session.title, "Explain quantum computing in s…");
        assert_eq!(session.messages.len(), 2);
        assert!(session.messages.iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn placeholder_is_mutated_in_place() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let id = store.active_session_id().unwrap().to_string();
        store.append_user_message(&id, "hi").unwrap();
        let placeholder = store.append_assistant_placeholder(&id, "m1").unwrap();

        store.mutate_message_content(&id, &placeholder, "H").unwrap();
        store.mutate_message_content(&id, &placeholder, "Hello").unwrap();

        let session = store.session(&id).unwrap();
        assert_eq!(session.messages.len(), 2);
        let reply = session.message(&placeholder).unwrap();
        assert_eq!(reply.content, "Hello");
        assert_eq!(reply.model.as_deref(), Some("m1"));
    }

    #[test]
    fn mutations_on_unknown_targets_fail() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let id = store.active_session_id().unwrap().to_string();

        assert_eq!(
            store.append_user_message("nope", "x"),
            Err(SessionStoreError::UnknownSession("nope".to_string()))
        );
        assert!(matches!(
            store.mutate_message_content(&id, "missing", "x"),
            Err(SessionStoreError::UnknownMessage { .. })
        ));
    }

    #[test]
    fn clear_messages_preserves_identity() {
        let mut store = SessionStore::load(MemoryStore::shared());
        let id = store.active_session_id().unwrap().to_string();
        store.append_user_message(&id, "keep the title").unwrap();
        let created_at = store.session(&id).unwrap().created_at;

        store.clear_messages(&id).unwrap();

        let session = store.session(&id).unwrap();
        assert!(session.messages.is_empty());
        assert_eq!(session.title, "keep the title");
        assert_eq!(session.created_at, created_at);
    }

    #[test]
    fn every_mutation_is_written_through_to_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage: SharedStore = Arc::new(FileStore::new(temp_dir.path()));
        let mut store = SessionStore::load(storage.clone());
        let id = store.active_session_id().unwrap().to_string();

        store.append_user_message(&id, "persist me").unwrap();

        let reloaded = SessionStore::load(storage);
        let session = reloaded.session(&id).unwrap();
        assert_eq!(session.messages[0].content, "persist me");
        assert_eq!(reloaded.active_session_id(), Some(id.as_str()));
    }
}
