//! Interactive chat loop.
//!
//! Reads lines from stdin, runs slash commands, and prints replies as the
//! stream delivers them. Stream messages arrive on the service channel and
//! are folded into the active session by [`ChatController::apply`].

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::commands::{process_input, CommandContext, CommandResult};
use crate::core::chat::{ChatController, ChatError, ReplyEvent};
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::credentials;
use crate::core::saved_articles::SavedArticles;
use crate::core::thinking::{ThinkingHandle, ThinkingPhase, ThinkingSnapshot};
use crate::core::time::{format_date, now_millis};

use super::articles::{fetch_listing, ListingOptions};
use super::auth::KEY_PROMPT;
use super::context::CliContext;

const PROMPT: &str = "> ";

fn show_prompt(text: &str) -> io::Result<()> {
    print!("{text}");
    io::stdout().flush()
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn print_notices(chat: &mut ChatController) {
    for notice in chat.take_notices() {
        println!("{notice}");
    }
}

/// Merge runs of chunks from the same stream so each run is applied, and
/// persisted, once.
fn coalesce(batch: Vec<(StreamMessage, u64)>) -> Vec<(StreamMessage, u64)> {
    let mut merged: Vec<(StreamMessage, u64)> = Vec::with_capacity(batch.len());
    for (message, stream_id) in batch {
        if let (StreamMessage::Chunk(text), Some((StreamMessage::Chunk(previous), last_id))) =
            (&message, merged.last_mut())
        {
            if *last_id == stream_id {
                previous.push_str(text);
                continue;
            }
        }
        merged.push((message, stream_id));
    }
    merged
}

fn drain_ready(
    first: (StreamMessage, u64),
    rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
) -> Vec<(StreamMessage, u64)> {
    let mut batch = vec![first];
    while let Ok(next) = rx.try_recv() {
        batch.push(next);
    }
    coalesce(batch)
}

/// Thinking animation as printed lines: the header once it is complete,
/// then each new thought.
#[derive(Default)]
struct ThinkingView {
    handle: Option<ThinkingHandle>,
    updates: Option<watch::Receiver<ThinkingSnapshot>>,
    header_shown: bool,
    thoughts_shown: usize,
}

impl ThinkingView {
    fn start(&mut self, prompt: &str) {
        let handle = ThinkingHandle::start(prompt);
        self.updates = Some(handle.subscribe());
        self.handle = Some(handle);
        self.header_shown = false;
        self.thoughts_shown = 0;
    }

    fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    fn stop(&mut self) {
        self.updates = None;
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }

    /// Let the animation run for its minimum time, then retire it.
    async fn finish(&mut self) {
        self.updates = None;
        if let Some(handle) = self.handle.take() {
            handle.finish().await;
        }
    }

    async fn changed(&mut self) -> Option<ThinkingSnapshot> {
        let updates = self.updates.as_mut()?;
        if updates.changed().await.is_err() {
            self.updates = None;
            return None;
        }
        let snapshot = updates.borrow_and_update().clone();
        Some(snapshot)
    }

    fn new_lines(&mut self, snapshot: &ThinkingSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        if snapshot.phase == ThinkingPhase::Idle {
            return lines;
        }
        if !self.header_shown && snapshot.phase == ThinkingPhase::Streaming {
            self.header_shown = true;
            lines.push(format!("💭 {}", snapshot.header));
        }
        if self.header_shown {
            for thought in snapshot.thoughts.iter().skip(self.thoughts_shown) {
                lines.push(format!("   · {thought}"));
            }
            self.thoughts_shown = snapshot.thoughts.len();
        }
        lines
    }
}

fn print_banner(chat: &ChatController) {
    let model = chat.model();
    println!(
        "blendchat {} · {} [{}]",
        env!("CARGO_PKG_VERSION"),
        model.name,
        model.id
    );
    if let Some(session) = chat.active_session() {
        println!(
            "Conversation: {} ({} message{})",
            session.title,
            session.messages.len(),
            if session.messages.len() == 1 { "" } else { "s" }
        );
        for message in session.messages.iter().filter(|m| !m.content.is_empty()) {
            println!("{}: {}", message.role.sender_label(), message.content);
        }
    }
    println!("Type /help for commands, /quit to leave.");
}

pub async fn run_chat(ctx: &CliContext) -> Result<(), Box<dyn Error>> {
    let mut chat = ctx.chat_controller()?;
    let mut saved = SavedArticles::load(ctx.storage.clone());
    let export_dir = std::env::current_dir()?;
    let (stream_service, mut rx) = ChatStreamService::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut thinking = ThinkingView::default();
    let mut awaiting_key = false;
    let mut reply_open = false;

    chat.take_notices();
    print_banner(&chat);
    show_prompt(PROMPT)?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };

                if awaiting_key {
                    awaiting_key = false;
                    match credentials::store(ctx.storage.as_ref(), &line) {
                        Ok(()) => println!("✅ API key saved. Send your message again."),
                        Err(err) => println!("❌ {err}"),
                    }
                    show_prompt(PROMPT)?;
                    continue;
                }

                let mut command_ctx = CommandContext {
                    chat: &mut chat,
                    saved_articles: &mut saved,
                    export_dir: &export_dir,
                    today: format_date(now_millis()),
                    output: Vec::new(),
                };
                let result = process_input(&mut command_ctx, &line);
                let output = std::mem::take(&mut command_ctx.output);
                print_lines(&output);

                match result {
                    CommandResult::Continue => show_prompt(PROMPT)?,
                    CommandResult::Quit => break,
                    CommandResult::FetchArticles { search } => {
                        let options = ListingOptions {
                            search,
                            page: 1,
                            ..Default::default()
                        };
                        match fetch_listing(ctx, &saved, &options).await {
                            Ok(listing) => print_lines(&listing),
                            Err(err) => println!("❌ {err}"),
                        }
                        show_prompt(PROMPT)?;
                    }
                    CommandResult::ProcessAsMessage(text) => match chat.begin_send(&text) {
                        Ok(outgoing) => {
                            if reply_open {
                                println!();
                                reply_open = false;
                            }
                            thinking.stop();
                            if ctx.config.thinking_enabled() {
                                thinking.start(&text);
                            }
                            stream_service.spawn_stream(StreamParams {
                                backend: ctx.completion_backend(&outgoing.api_key),
                                request: outgoing.request,
                                stream: outgoing.stream,
                                cancel_token: outgoing.cancel_token,
                                stream_id: outgoing.stream_id,
                            });
                        }
                        Err(ChatError::MissingCredential) => {
                            println!("❌ {}", ChatError::MissingCredential);
                            awaiting_key = true;
                            show_prompt(KEY_PROMPT)?;
                        }
                        Err(ChatError::EmptyPrompt) => show_prompt(PROMPT)?,
                        Err(err) => {
                            println!("❌ {err}");
                            show_prompt(PROMPT)?;
                        }
                    },
                }
            }
            Some(first) = rx.recv() => {
                for (message, stream_id) in drain_ready(first, &mut rx) {
                    if !chat.is_current_stream(stream_id) {
                        continue;
                    }
                    if thinking.is_active() {
                        thinking.finish().await;
                    }
                    match chat.apply(message, stream_id) {
                        Some(ReplyEvent::Text(text)) => {
                            if !reply_open {
                                print!("Assistant: ");
                                reply_open = true;
                            }
                            print!("{text}");
                        }
                        Some(ReplyEvent::Failed(_)) => {
                            if reply_open {
                                println!();
                                reply_open = false;
                            }
                            print_notices(&mut chat);
                            show_prompt(PROMPT)?;
                        }
                        Some(ReplyEvent::Finished { .. }) => {
                            println!();
                            reply_open = false;
                            show_prompt(PROMPT)?;
                        }
                        None => {}
                    }
                }
                io::stdout().flush()?;
            }
            Some(snapshot) = thinking.changed() => {
                print_lines(&thinking.new_lines(&snapshot));
            }
        }
    }

    chat.cancel_current_stream();
    thinking.stop();
    println!();
    Ok(())
}
