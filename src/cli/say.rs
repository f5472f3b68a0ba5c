//! One-shot "say" command: send a single prompt and print the reply.
//! Nothing is recorded in the stored conversations.

use std::error::Error;
use std::io::{self, Write};

use tokio_util::sync::CancellationToken;

use crate::api::completion::CompletionRequest;
use crate::api::ApiMessage;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::credentials::{self, API_KEY_ENV};
use crate::core::message::Role;

use super::context::CliContext;

pub async fn run_say(ctx: &CliContext, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: blendchat say <prompt>");
        std::process::exit(1);
    }

    let Some(credential) = credentials::resolve(ctx.storage.as_ref()) else {
        eprintln!("❌ No API key configured. Run 'blendchat auth' or set {API_KEY_ENV}.");
        std::process::exit(1);
    };

    let controller = ctx.chat_controller()?;
    let params = StreamParams {
        backend: ctx.completion_backend(&credential.token),
        request: CompletionRequest {
            model: controller.model().id.clone(),
            messages: vec![ApiMessage {
                role: Role::User.as_str().to_string(),
                content: prompt.trim().to_string(),
            }],
        },
        stream: ctx.stream_enabled(),
        cancel_token: CancellationToken::new(),
        stream_id: 0,
    };

    let (stream_service, mut rx) = ChatStreamService::new();
    stream_service.spawn_stream(params);

    loop {
        match rx.recv().await {
            Some((StreamMessage::Chunk(content), _)) => {
                print!("{content}");
                io::stdout().flush()?;
            }
            Some((StreamMessage::Error(err), _)) => {
                eprintln!("\n\n❌ Error: {err}");
                std::process::exit(1);
            }
            Some((StreamMessage::End, _)) => {
                println!();
                break;
            }
            None => break,
        }
    }

    Ok(())
}
