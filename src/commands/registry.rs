use super::{CommandContext, CommandResult};

pub type CommandHandler = fn(&mut CommandContext<'_>, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

impl CommandInvocation<'_> {
    pub fn arg(&self) -> Option<&str> {
        Some(self.args).filter(|a| !a.is_empty())
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Start a new conversation.",
        handler: super::handle_new,
    },
    Command {
        name: "sessions",
        usage: "/sessions",
        help: "List conversations, newest first.",
        handler: super::handle_sessions,
    },
    Command {
        name: "select",
        usage: "/select <number|id>",
        help: "Switch to another conversation.",
        handler: super::handle_select,
    },
    Command {
        name: "delete",
        usage: "/delete [number|id]",
        help: "Delete a conversation (the current one by default).",
        handler: super::handle_delete,
    },
    Command {
        name: "clear",
        usage: "/clear",
        help: "Remove all messages from the current conversation.",
        handler: super::handle_clear,
    },
    Command {
        name: "model",
        usage: "/model [id]",
        help: "Show or change the model.",
        handler: super::handle_model,
    },
    Command {
        name: "models",
        usage: "/models",
        help: "List available models.",
        handler: super::handle_models,
    },
    Command {
        name: "export",
        usage: "/export [md|txt] [path]",
        help: "Export the current conversation.",
        handler: super::handle_export,
    },
    Command {
        name: "articles",
        usage: "/articles [search]",
        help: "Browse space news, optionally filtered by title.",
        handler: super::handle_articles,
    },
    Command {
        name: "save",
        usage: "/save <article id>",
        help: "Bookmark an article, or remove the bookmark.",
        handler: super::handle_save,
    },
    Command {
        name: "key",
        usage: "/key <token>",
        help: "Store the OpenRouter API key.",
        handler: super::handle_key,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
