//! Chat-completion client and the streaming response assembler.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::api::{ApiMessage, ChatRequest, ChatResponse, CompletionResponse};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

#[derive(Debug)]
pub enum CompletionError {
    /// Upstream answered with a non-2xx status.
    Api { status: u16, body: String },
    Transport(reqwest::Error),
    /// The streaming response ended before a single byte arrived.
    EmptyBody,
    /// The provider reported an error inside the event stream.
    Stream(String),
    Decode(serde_json::Error),
    NoChoices,
    Cancelled,
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::Api { status, body } => {
                let detail = error_summary(body).unwrap_or_else(|| {
                    let trimmed = body.trim();
                    if trimmed.is_empty() {
                        "<no body>".to_string()
                    } else {
                        trimmed.to_string()
                    }
                });
                write!(f, "API request failed: {status} - {detail}")
            }
            CompletionError::Transport(err) => write!(f, "Request failed: {err}"),
            CompletionError::EmptyBody => write!(f, "Response body is empty"),
            CompletionError::Stream(message) => write!(f, "API Error: {message}"),
            CompletionError::Decode(err) => write!(f, "Failed to decode response: {err}"),
            CompletionError::NoChoices => write!(f, "Response contained no choices"),
            CompletionError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl StdError for CompletionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            CompletionError::Transport(err) => Some(err),
            CompletionError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Transport(err)
    }
}

/// Pull a one-line human summary out of a provider error payload.
pub fn error_summary(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    summary_from_value(&value)
}

fn summary_from_value(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerState {
    /// No bytes received yet.
    Open,
    Receiving,
    /// `[DONE]` seen; further input is ignored.
    Finished,
}

/// Incrementally turns raw SSE bytes into assistant text.
///
/// Each content fragment is handed to the caller one grapheme at a time, so
/// the concatenation of everything emitted equals [`StreamAssembler::text`].
#[derive(Debug)]
pub struct StreamAssembler {
    state: AssemblerState,
    buffer: Vec<u8>,
    text: String,
    received_bytes: usize,
    skipped_frames: usize,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self {
            state: AssemblerState::Open,
            buffer: Vec::new(),
            text: String::new(),
            received_bytes: 0,
            skipped_frames: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of `data:` frames dropped because they were not valid JSON.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    pub fn feed(
        &mut self,
        bytes: &[u8],
        on_char: &mut dyn FnMut(&str),
    ) -> Result<AssemblerState, CompletionError> {
        if self.state == AssemblerState::Finished {
            return Ok(self.state);
        }
        if !bytes.is_empty() {
            self.received_bytes += bytes.len();
            self.state = AssemblerState::Receiving;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.process_line(&line[..newline_pos], on_char)?;
            if self.state == AssemblerState::Finished {
                self.buffer.clear();
                break;
            }
        }
        Ok(self.state)
    }

    /// Flush any trailing line and return the assembled text.
    pub fn finish(mut self, on_char: &mut dyn FnMut(&str)) -> Result<String, CompletionError> {
        if self.state != AssemblerState::Finished && !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.process_line(&rest, on_char)?;
        }
        if self.received_bytes == 0 {
            return Err(CompletionError::EmptyBody);
        }
        if self.state != AssemblerState::Finished {
            debug!("stream ended without [DONE]");
        }
        Ok(self.text)
    }

    fn process_line(
        &mut self,
        raw: &[u8],
        on_char: &mut dyn FnMut(&str),
    ) -> Result<(), CompletionError> {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!("Invalid UTF-8 in stream: {err}");
                return Ok(());
            }
        };

        // Blank separators, SSE comments and non-data fields carry no content.
        let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
            return Ok(());
        };

        if payload == "[DONE]" {
            self.state = AssemblerState::Finished;
            return Ok(());
        }
        if payload.is_empty() {
            return Ok(());
        }

        match serde_json::from_str::<ChatResponse>(payload) {
            Ok(response) => {
                if let Some(error) = response.error {
                    let summary = summary_from_value(&serde_json::json!({ "error": &error }))
                        .unwrap_or_else(|| error.to_string());
                    return Err(CompletionError::Stream(summary));
                }
                if let Some(content) = response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                {
                    for grapheme in content.graphemes(true) {
                        on_char(grapheme);
                    }
                    self.text.push_str(&content);
                }
                Ok(())
            }
            Err(err) => {
                warn!("Skipping malformed stream frame: {err}");
                self.skipped_frames += 1;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
}

/// Something that can answer a chat completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_char: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String, CompletionError>;
}

/// OpenAI-compatible HTTP client (OpenRouter by default).
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    app_title: Option<String>,
    referer: Option<String>,
}

impl CompletionClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            app_title: None,
            referer: None,
        }
    }

    pub fn with_attribution(mut self, app_title: Option<String>, referer: Option<String>) -> Self {
        self.app_title = app_title;
        self.referer = referer;
        self
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, CompletionError> {
        let url = construct_api_url(&self.base_url, "chat/completions");
        let http_request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        let http_request = add_auth_headers(
            http_request,
            &self.api_key,
            self.app_title.as_deref(),
            self.referer.as_deref(),
        );

        debug!(model = %request.model, stream = request.stream, "sending completion request");
        let response = http_request.json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(CompletionError::Api { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: request.model,
            messages: request.messages,
            stream: false,
        };
        let response = self.send(&request).await?;
        let body = response.bytes().await?;
        let parsed: CompletionResponse =
            serde_json::from_slice(&body).map_err(CompletionError::Decode)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(CompletionError::NoChoices)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
        on_char: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: request.model,
            messages: request.messages,
            stream: true,
        };

        let response = tokio::select! {
            result = self.send(&request) => result?,
            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
        };

        let mut stream = response.bytes_stream();
        let mut assembler = StreamAssembler::new();

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
            };
            let Some(chunk) = chunk else {
                break;
            };
            let bytes = chunk?;
            if assembler.feed(&bytes, on_char)? == AssemblerState::Finished {
                break;
            }
        }

        assembler.finish(on_char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{json_response, serve_once};

    fn collect(assembler: &mut StreamAssembler, chunks: &[&[u8]]) -> Vec<String> {
        let mut emitted = Vec::new();
        for chunk in chunks {
            assembler
                .feed(chunk, &mut |c| emitted.push(c.to_string()))
                .expect("feed failed");
        }
        emitted
    }

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices":[{"delta":{"content":content}}]})
        )
    }

    #[test]
    fn assembler_handles_spacing_variants_and_done() {
        let mut assembler = StreamAssembler::new();
        let input = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data:{\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        );
        let emitted = collect(&mut assembler, &[input.as_bytes()]);

        assert_eq!(emitted, vec!["H", "e", "l", "l", "o"]);
        assert_eq!(assembler.state(), AssemblerState::Finished);
        assert_eq!(assembler.finish(&mut |_| {}).unwrap(), "Hello");
    }

    #[test]
    fn assembler_reassembles_frames_split_across_chunks() {
        let full = format!("{}{}data: [DONE]\n", frame("héllo "), frame("wörld 👋🏽"));
        let bytes = full.as_bytes();
        // Split inside a multi-byte character and inside the JSON.
        let split_at = full.find('é').unwrap() + 1;
        let mut assembler = StreamAssembler::new();
        let emitted = collect(
            &mut assembler,
            &[
                &bytes[..split_at],
                &bytes[split_at..split_at + 20],
                &bytes[split_at + 20..],
            ],
        );

        assert_eq!(emitted.concat(), "héllo wörld 👋🏽");
        assert!(emitted.contains(&"👋🏽".to_string()));
        assert_eq!(assembler.text(), "héllo wörld 👋🏽");
    }

    #[test]
    fn assembler_skips_malformed_frames_and_comments() {
        let mut assembler = StreamAssembler::new();
        let input = format!(
            ": OPENROUTER PROCESSING\n\ndata: {{not json\nevent: ping\n{}data: [DONE]\n",
            frame("ok")
        );
        let emitted = collect(&mut assembler, &[input.as_bytes()]);

        assert_eq!(emitted.concat(), "ok");
        assert_eq!(assembler.skipped_frames(), 1);
    }

    #[test]
    fn assembler_reports_in_stream_errors() {
        let mut assembler = StreamAssembler::new();
        let result = assembler.feed(
            br#"data: {"error":{"message":"internal   server error"}}
"#,
            &mut |_| {},
        );
        match result {
            Err(CompletionError::Stream(message)) => {
                assert_eq!(message, "internal server error")
            }
            other => panic!("expected stream error, got {other:?}"),
        }
    }

    #[test]
    fn assembler_flushes_trailing_line_without_newline() {
        let mut assembler = StreamAssembler::new();
        let input = frame("tail");
        let trimmed = input.trim_end();
        let mut emitted = collect(&mut assembler, &[trimmed.as_bytes()]);
        assert!(emitted.is_empty());

        let text = assembler.finish(&mut |c| emitted.push(c.to_string())).unwrap();
        assert_eq!(text, "tail");
        assert_eq!(emitted.concat(), "tail");
    }

    #[test]
    fn assembler_without_input_is_an_empty_body() {
        let assembler = StreamAssembler::new();
        assert_eq!(assembler.state(), AssemblerState::Open);
        assert!(matches!(
            assembler.finish(&mut |_| {}),
            Err(CompletionError::EmptyBody)
        ));
    }

    #[test]
    fn error_summary_extracts_known_shapes() {
        assert_eq!(
            error_summary(r#"{"error":{"message":"model overloaded","code":503}}"#).as_deref(),
            Some("model overloaded")
        );
        assert_eq!(
            error_summary(r#"{"error":"bad key"}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(
            error_summary(r#"{"message":"  spaced\n out  "}"#).as_deref(),
            Some("spaced out")
        );
        assert_eq!(error_summary(r#"{"status":"failed"}"#), None);
        assert_eq!(error_summary("<html>nope</html>"), None);
    }

    #[test]
    fn api_error_display_includes_status_and_summary() {
        let err = CompletionError::Api {
            status: 401,
            body: r#"{"error":{"message":"No auth credentials found"}}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API request failed: 401 - No auth credentials found"
        );
        let err = CompletionError::Api {
            status: 502,
            body: "  ".to_string(),
        };
        assert_eq!(err.to_string(), "API request failed: 502 - <no body>");
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m1".to_string(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
        }
    }

    fn sse_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{body}"
        )
    }

    #[tokio::test]
    async fn complete_returns_first_choice_content() {
        let body = r#"{"id":"x","choices":[{"message":{"role":"assistant","content":"Hello there"},"finish_reason":"stop"}]}"#;
        let (base_url, server) = serve_once(json_response("200 OK", body)).await;
        let client = CompletionClient::new(reqwest::Client::new(), &base_url, "sk-test")
            .with_attribution(Some("Blend AI Chat".to_string()), None);

        let text = client.complete(request()).await.expect("completion");
        assert_eq!(text, "Hello there");

        let captured = server.await.unwrap().expect("captured request");
        assert_eq!(captured.request_line, "POST /chat/completions HTTP/1.1");
        assert_eq!(captured.header("authorization"), Some("Bearer sk-test"));
        assert_eq!(captured.header("x-title"), Some("Blend AI Chat"));
        let sent: serde_json::Value = serde_json::from_slice(&captured.body).unwrap();
        assert_eq!(sent["model"], "m1");
        assert_eq!(sent["messages"][0]["content"], "hi");
        assert!(sent.get("stream").is_none());
    }

    #[tokio::test]
    async fn streaming_matches_non_streaming_content() {
        let reply = "Quantum bits can be 0 and 1 at once, sort of. 🧪";
        let chunks: String = reply
            .split_inclusive(' ')
            .map(frame)
            .chain(std::iter::once("data: [DONE]\n\n".to_string()))
            .collect();

        let (stream_url, stream_server) = serve_once(sse_response(&chunks)).await;
        let streamer = CompletionClient::new(reqwest::Client::new(), &stream_url, "k");
        let mut emitted = Vec::new();
        let streamed = streamer
            .stream(request(), CancellationToken::new(), &mut |c| {
                emitted.push(c.to_string())
            })
            .await
            .expect("stream");

        let sent: serde_json::Value =
            serde_json::from_slice(&stream_server.await.unwrap().unwrap().body).unwrap();
        assert_eq!(sent["stream"], true);

        let body = serde_json::json!({"choices":[{"message":{"content":reply}}]}).to_string();
        let (plain_url, _plain_server) = serve_once(json_response("200 OK", &body)).await;
        let plain = CompletionClient::new(reqwest::Client::new(), &plain_url, "k")
            .complete(request())
            .await
            .expect("completion");

        assert_eq!(emitted.concat(), streamed);
        assert_eq!(streamed, plain);
        assert!(emitted.len() > chunks.matches("data:").count());
    }

    #[tokio::test]
    async fn non_success_status_surfaces_api_error() {
        let body = r#"{"error":{"message":"Invalid API key"}}"#;
        let response = json_response("401 Unauthorized", body);
        let (base_url, _server) = serve_once(response).await;
        let client = CompletionClient::new(reqwest::Client::new(), &base_url, "bad");

        let err = client
            .stream(request(), CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();
        match err {
            CompletionError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_stream_is_a_transport_error() {
        let (base_url, _server) = serve_once(sse_response("")).await;
        let client = CompletionClient::new(reqwest::Client::new(), &base_url, "k");

        let err = client
            .stream(request(), CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::EmptyBody));
    }

    #[tokio::test]
    async fn missing_choices_is_reported() {
        let (base_url, _server) = serve_once(json_response("200 OK", r#"{"choices":[]}"#)).await;
        let client = CompletionClient::new(reqwest::Client::new(), &base_url, "k");
        assert!(matches!(
            client.complete(request()).await,
            Err(CompletionError::NoChoices)
        ));
    }

    #[tokio::test]
    async fn cancelled_stream_returns_cancelled() {
        let (base_url, _server) = serve_once(sse_response(&frame("never"))).await;
        let client = CompletionClient::new(reqwest::Client::new(), &base_url, "k");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .stream(request(), cancel, &mut |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Cancelled));
    }
}
