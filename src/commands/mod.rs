mod registry;

pub use registry::{all_commands, find_command, CommandInvocation};

use std::path::{Path, PathBuf};

use crate::cli::model_list::{describe_model, model_lines};
use crate::cli::sessions::session_lines;
use crate::core::chat::ChatController;
use crate::core::credentials;
use crate::core::export::{write_export, ExportError, ExportFormat};
use crate::core::notice::Notice;
use crate::core::saved_articles::SavedArticles;

pub enum CommandResult {
    Continue,
    ProcessAsMessage(String),
    /// Fetch and print articles; runs on the chat loop because it awaits.
    FetchArticles { search: Option<String> },
    Quit,
}

/// State a slash command may read or change. Handlers write what the user
/// should see into `output`.
pub struct CommandContext<'a> {
    pub chat: &'a mut ChatController,
    pub saved_articles: &'a mut SavedArticles,
    pub export_dir: &'a Path,
    /// `YYYY-MM-DD`, used in export file names.
    pub today: String,
    pub output: Vec<String>,
}

impl CommandContext<'_> {
    fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    fn notice(&mut self, notice: Notice) {
        self.output.push(notice.to_string());
    }
}

pub fn process_input(ctx: &mut CommandContext<'_>, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match find_command(command_name) {
        Some(command) => {
            let invocation = CommandInvocation {
                input: trimmed,
                args,
            };
            let result = (command.handler)(ctx, invocation);
            let notices = ctx.chat.take_notices();
            for notice in notices {
                ctx.notice(notice);
            }
            result
        }
        None => {
            ctx.say(format!(
                "❌ Unknown command: /{command_name}. Type /help for a list."
            ));
            CommandResult::Continue
        }
    }
}

pub(super) fn handle_help(ctx: &mut CommandContext<'_>, _: CommandInvocation<'_>) -> CommandResult {
    ctx.say("Commands:");
    for command in all_commands() {
        ctx.say(format!("  {:<26} {}", command.usage, command.help));
    }
    ctx.say("Anything else is sent to the model.");
    CommandResult::Continue
}

pub(super) fn handle_new(ctx: &mut CommandContext<'_>, _: CommandInvocation<'_>) -> CommandResult {
    ctx.chat.new_session();
    CommandResult::Continue
}

pub(super) fn handle_sessions(
    ctx: &mut CommandContext<'_>,
    _: CommandInvocation<'_>,
) -> CommandResult {
    let lines = session_lines(ctx.chat.sessions());
    ctx.output.extend(lines);
    CommandResult::Continue
}

pub(super) fn handle_select(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let Some(reference) = invocation.arg() else {
        ctx.say("⚠️  Usage: /select <number|id>");
        return CommandResult::Continue;
    };
    match ctx.chat.resolve_session_ref(reference) {
        Some(id) => {
            ctx.chat.select_session(&id);
            let title = ctx
                .chat
                .active_session()
                .map(|s| s.title.clone())
                .unwrap_or_default();
            ctx.say(format!("Switched to: {title}"));
            print_transcript(ctx);
        }
        None => ctx.say(format!("❌ No conversation matches '{reference}'")),
    }
    CommandResult::Continue
}

fn print_transcript(ctx: &mut CommandContext<'_>) {
    let Some(session) = ctx.chat.active_session() else {
        return;
    };
    let lines: Vec<String> = session
        .messages
        .iter()
        .map(|m| format!("{}: {}", m.role.sender_label(), m.content))
        .collect();
    ctx.output.extend(lines);
}

pub(super) fn handle_delete(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let target = match invocation.arg() {
        Some(reference) => ctx.chat.resolve_session_ref(reference),
        None => ctx.chat.sessions().active_session_id().map(str::to_string),
    };
    match target {
        Some(id) => {
            ctx.chat.delete_session(&id);
        }
        None => ctx.say(format!(
            "❌ No conversation matches '{}'",
            invocation.args
        )),
    }
    CommandResult::Continue
}

pub(super) fn handle_clear(ctx: &mut CommandContext<'_>, _: CommandInvocation<'_>) -> CommandResult {
    if let Err(err) = ctx.chat.clear_active_session() {
        ctx.say(format!("❌ {err}"));
    }
    CommandResult::Continue
}

pub(super) fn handle_model(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    match invocation.arg() {
        None => {
            let model = ctx.chat.model().clone();
            let default = ctx.chat.registry().default_model().id == model.id;
            let lines = describe_model(&model, true, default);
            ctx.output.extend(lines);
        }
        Some(id) => match ctx.chat.select_model(id).map(|m| m.name.clone()) {
            Some(name) => ctx.say(format!("✅ Now using {name}")),
            None => ctx.say(format!("❌ Unknown model: {id}. Type /models for a list.")),
        },
    }
    CommandResult::Continue
}

pub(super) fn handle_models(
    ctx: &mut CommandContext<'_>,
    _: CommandInvocation<'_>,
) -> CommandResult {
    let lines = model_lines(ctx.chat.registry(), &ctx.chat.model().id);
    ctx.output.extend(lines);
    CommandResult::Continue
}

pub(super) fn handle_export(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let mut format = ExportFormat::Markdown;
    let mut target: Option<PathBuf> = None;
    for arg in invocation.args.split_whitespace() {
        match arg.parse::<ExportFormat>() {
            Ok(parsed) if target.is_none() => format = parsed,
            _ => target = Some(PathBuf::from(arg)),
        }
    }
    let target = target.unwrap_or_else(|| ctx.export_dir.to_path_buf());

    let Some(session) = ctx.chat.active_session() else {
        return CommandResult::Continue;
    };
    let notice = match write_export(session, format, &target, &ctx.today) {
        Ok(path) => Notice::info(
            "Export Successful",
            format!(
                "Chat exported as {} file to {}",
                format.label(),
                path.display()
            ),
        ),
        Err(ExportError::EmptySession) => {
            Notice::error("Cannot Export", "There are no messages to export.")
        }
        Err(err) => Notice::error("Export Failed", err.to_string()),
    };
    ctx.notice(notice);
    CommandResult::Continue
}

pub(super) fn handle_articles(
    _ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    CommandResult::FetchArticles {
        search: invocation.arg().map(str::to_string),
    }
}

pub(super) fn handle_save(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let Some(id) = invocation.arg() else {
        ctx.say("⚠️  Usage: /save <article id>");
        return CommandResult::Continue;
    };
    ctx.saved_articles.toggle(id);
    for notice in ctx.saved_articles.take_notices() {
        ctx.notice(notice);
    }
    CommandResult::Continue
}

pub(super) fn handle_key(
    ctx: &mut CommandContext<'_>,
    invocation: CommandInvocation<'_>,
) -> CommandResult {
    let token = invocation.args;
    match credentials::store(ctx.chat.storage().as_ref(), token) {
        Ok(()) => ctx.notice(Notice::info(
            "API key saved",
            format!("Using {}", credentials::mask(token.trim())),
        )),
        Err(err) => ctx.notice(Notice::error("API key not saved", err.to_string())),
    }
    CommandResult::Continue
}

pub(super) fn handle_quit(_: &mut CommandContext<'_>, _: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}

#[cfg(test)]
mod tests;
