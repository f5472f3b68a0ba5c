//! Send flow: context selection, stream bookkeeping and reply assembly.
//!
//! Every send starts a new stream generation. Updates tagged with an older
//! generation are dropped, so a superseded reply can never overwrite the
//! state produced by a newer one.

use std::error::Error as StdError;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::completion::CompletionRequest;
use crate::core::chat_stream::StreamMessage;
use crate::core::credentials;
use crate::core::models::{ModelDescriptor, ModelRegistry, ModelSelection};
use crate::core::notice::Notice;
use crate::core::session::ChatSession;
use crate::core::session_store::{SessionStore, SessionStoreError};
use crate::core::storage::SharedStore;

pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

#[derive(Debug)]
pub enum ChatError {
    MissingCredential,
    EmptyPrompt,
    Session(SessionStoreError),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::MissingCredential => write!(
                f,
                "No API key configured. Run `blendchat auth` or set {}",
                credentials::API_KEY_ENV
            ),
            ChatError::EmptyPrompt => write!(f, "Message is empty"),
            ChatError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for ChatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ChatError::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionStoreError> for ChatError {
    fn from(err: SessionStoreError) -> Self {
        ChatError::Session(err)
    }
}

/// Everything needed to issue the request for one send.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub stream_id: u64,
    pub api_key: String,
    pub request: CompletionRequest,
    pub stream: bool,
    pub cancel_token: CancellationToken,
}

/// What applying a stream message changed, for the front end to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    Text(String),
    Failed(String),
    Finished { content: String },
}

#[derive(Debug)]
struct PendingReply {
    stream_id: u64,
    session_id: String,
    model_id: String,
    message_id: Option<String>,
    content: String,
    failed: bool,
}

pub struct ChatController {
    sessions: SessionStore,
    registry: ModelRegistry,
    selection: ModelSelection,
    storage: SharedStore,
    context_window: usize,
    stream_enabled: bool,
    current_stream_id: u64,
    stream_cancel_token: Option<CancellationToken>,
    pending: Option<PendingReply>,
    env_credential: Option<String>,
    notices: Vec<Notice>,
}

impl ChatController {
    pub fn new(storage: SharedStore, registry: ModelRegistry) -> Self {
        let sessions = SessionStore::load(storage.clone());
        let selection = ModelSelection::load(storage.clone(), &registry);
        Self {
            sessions,
            registry,
            selection,
            storage,
            context_window: DEFAULT_CONTEXT_WINDOW,
            stream_enabled: true,
            current_stream_id: 0,
            stream_cancel_token: None,
            pending: None,
            env_credential: std::env::var(credentials::API_KEY_ENV).ok(),
            notices: Vec::new(),
        }
    }

    /// Override the environment fallback for the API key.
    pub fn with_env_credential(mut self, token: Option<String>) -> Self {
        self.env_credential = token;
        self
    }

    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.stream_enabled = enabled;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.sessions.active_session()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn model(&self) -> &ModelDescriptor {
        self.selection.descriptor(&self.registry)
    }

    pub fn select_model(&mut self, id: &str) -> Option<&ModelDescriptor> {
        self.selection.select(&self.registry, id)
    }

    pub fn storage(&self) -> &SharedStore {
        &self.storage
    }

    pub fn is_streaming(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.current_stream_id == stream_id
    }

    /// Notices from the controller and the session store, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        let mut notices = self.sessions.take_notices();
        notices.append(&mut self.notices);
        notices
    }

    /// Map a 1-based list position or a session id to a session id.
    pub fn resolve_session_ref(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if let Ok(index) = reference.parse::<usize>() {
            if let Some(session) = index
                .checked_sub(1)
                .and_then(|i| self.sessions.sessions().get(i))
            {
                return Some(session.id.clone());
            }
        }
        self.sessions
            .session(reference)
            .map(|session| session.id.clone())
    }

    pub fn cancel_current_stream(&mut self) {
        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
        if let Some(pending) = self.pending.take() {
            debug!(stream_id = pending.stream_id, "abandoning in-flight reply");
        }
    }

    fn start_new_stream(&mut self) -> (CancellationToken, u64) {
        self.cancel_current_stream();
        self.current_stream_id += 1;
        let token = CancellationToken::new();
        self.stream_cancel_token = Some(token.clone());
        (token, self.current_stream_id)
    }

    /// Record the user's message in the active session and build the request.
    ///
    /// The context is the last `context_window` messages already in the
    /// session followed by the new message. Any reply still in flight is
    /// superseded.
    pub fn begin_send(&mut self, text: &str) -> Result<OutgoingRequest, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        let credential =
            credentials::resolve_with_env(self.storage.as_ref(), self.env_credential.clone())
                .ok_or(ChatError::MissingCredential)?;

        let session_id = match self.sessions.active_session_id() {
            Some(id) => id.to_string(),
            None => self.sessions.create_session(),
        };

        let mut messages: Vec<_> = self
            .sessions
            .session(&session_id)
            .map(|session| {
                session
                    .recent_messages(self.context_window)
                    .iter()
                    .filter(|m| !m.content.is_empty())
                    .map(|m| m.to_api())
                    .collect()
            })
            .unwrap_or_default();

        let message_id = self.sessions.append_user_message(&session_id, text)?;
        if let Some(message) = self
            .sessions
            .session(&session_id)
            .and_then(|s| s.message(&message_id))
        {
            messages.push(message.to_api());
        }

        let model_id = self.selection.id().to_string();
        let (cancel_token, stream_id) = self.start_new_stream();
        self.pending = Some(PendingReply {
            stream_id,
            session_id,
            model_id: model_id.clone(),
            message_id: None,
            content: String::new(),
            failed: false,
        });

        debug!(stream_id, model = %model_id, context = messages.len(), "starting reply");
        Ok(OutgoingRequest {
            stream_id,
            api_key: credential.token,
            request: CompletionRequest {
                model: model_id,
                messages,
            },
            stream: self.stream_enabled,
            cancel_token,
        })
    }

    /// Fold one stream message into the session. Returns `None` for
    /// messages from superseded streams.
    pub fn apply(&mut self, message: StreamMessage, stream_id: u64) -> Option<ReplyEvent> {
        if !self.is_current_stream(stream_id) {
            debug!(stream_id, current = self.current_stream_id, "dropping stale stream update");
            return None;
        }
        let pending = self.pending.as_mut()?;

        match message {
            StreamMessage::Chunk(text) => {
                // The placeholder only appears once there is something to show.
                let message_id = match &pending.message_id {
                    Some(id) => id.clone(),
                    None => match self
                        .sessions
                        .append_assistant_placeholder(&pending.session_id, &pending.model_id)
                    {
                        Ok(id) => {
                            pending.message_id = Some(id.clone());
                            id
                        }
                        Err(err) => {
                            warn!("Dropping reply: {err}");
                            self.pending = None;
                            return None;
                        }
                    },
                };
                pending.content.push_str(&text);
                if let Err(err) = self.sessions.mutate_message_content(
                    &pending.session_id,
                    &message_id,
                    &pending.content,
                ) {
                    warn!("Dropping reply: {err}");
                    self.pending = None;
                    return None;
                }
                Some(ReplyEvent::Text(text))
            }
            StreamMessage::Error(text) => {
                pending.failed = true;
                self.notices.push(Notice::error("Error", text.clone()));
                Some(ReplyEvent::Failed(text))
            }
            StreamMessage::End => {
                let pending = self.pending.take()?;
                self.stream_cancel_token = None;
                if pending.failed {
                    return None;
                }
                Some(ReplyEvent::Finished {
                    content: pending.content,
                })
            }
        }
    }

    pub fn new_session(&mut self) -> String {
        self.sessions.create_session()
    }

    pub fn select_session(&mut self, id: &str) -> bool {
        self.sessions.select_session(id)
    }

    pub fn delete_session(&mut self, id: &str) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.session_id == id) {
            self.cancel_current_stream();
        }
        self.sessions.delete_session(id)
    }

    pub fn clear_active_session(&mut self) -> Result<(), ChatError> {
        let Some(id) = self.sessions.active_session_id().map(str::to_string) else {
            return Ok(());
        };
        if self.pending.as_ref().is_some_and(|p| p.session_id == id) {
            self.cancel_current_stream();
        }
        self.sessions.clear_messages(&id)?;
        self.notices
            .push(Notice::info("Messages cleared", "The conversation is empty again"));
        Ok(())
    }
}
