use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::completion::{CompletionBackend, CompletionError, CompletionRequest};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

pub struct StreamParams {
    pub backend: Arc<dyn CompletionBackend>,
    pub request: CompletionRequest,
    pub stream: bool,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Runs completion requests off the input loop and reports progress as
/// `(message, stream_id)` pairs.
#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A cancelled request reports nothing at all; every other outcome ends
    /// with [`StreamMessage::End`].
    pub fn spawn_stream(&self, params: StreamParams) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                backend,
                request,
                stream,
                cancel_token,
                stream_id,
            } = params;

            let result = if stream {
                let chunk_tx = tx.clone();
                let mut on_char = move |grapheme: &str| {
                    let _ = chunk_tx.send((StreamMessage::Chunk(grapheme.to_string()), stream_id));
                };
                backend
                    .stream(request, cancel_token.clone(), &mut on_char)
                    .await
            } else {
                tokio::select! {
                    result = backend.complete(request) => result.inspect(|text| {
                        let _ = tx.send((StreamMessage::Chunk(text.clone()), stream_id));
                    }),
                    _ = cancel_token.cancelled() => Err(CompletionError::Cancelled),
                }
            };

            match result {
                Ok(_) => {
                    let _ = tx.send((StreamMessage::End, stream_id));
                }
                Err(CompletionError::Cancelled) => {
                    debug!(stream_id, "completion cancelled");
                }
                Err(err) => {
                    let _ = tx.send((StreamMessage::Error(err.to_string()), stream_id));
                    let _ = tx.send((StreamMessage::End, stream_id));
                }
            }
        })
    }
}
