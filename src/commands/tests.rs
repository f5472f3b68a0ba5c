use super::*;
use crate::core::chat_stream::StreamMessage;
use crate::core::message::Role;
use crate::core::models::ModelRegistry;
use crate::core::storage::{KeyValueStore, MemoryStore, KEY_API_KEY, KEY_SAVED_ARTICLES};
use std::fs;
use tempfile::TempDir;

struct Harness {
    chat: ChatController,
    saved: SavedArticles,
    export_dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let storage = MemoryStore::shared();
        storage.set(KEY_API_KEY, "sk-or-test").unwrap();
        let mut chat = ChatController::new(storage.clone(), ModelRegistry::builtin())
            .with_env_credential(None);
        chat.take_notices();
        Self {
            chat,
            saved: SavedArticles::load(storage),
            export_dir: TempDir::new().unwrap(),
        }
    }

    fn run(&mut self, input: &str) -> (CommandResult, Vec<String>) {
        let mut ctx = CommandContext {
            chat: &mut self.chat,
            saved_articles: &mut self.saved,
            export_dir: self.export_dir.path(),
            today: "2024-06-06".to_string(),
            output: Vec::new(),
        };
        let result = process_input(&mut ctx, input);
        (result, ctx.output)
    }

    fn say(&mut self, text: &str, reply: &str) {
        let outgoing = self.chat.begin_send(text).unwrap();
        for c in reply.chars() {
            self.chat
                .apply(StreamMessage::Chunk(c.to_string()), outgoing.stream_id);
        }
        self.chat.apply(StreamMessage::End, outgoing.stream_id);
    }
}

#[test]
fn plain_text_is_sent_as_a_message() {
    let mut harness = Harness::new();
    let (result, output) = harness.run("hello there");
    assert!(matches!(result, CommandResult::ProcessAsMessage(text) if text == "hello there"));
    assert!(output.is_empty());

    let (result, _) = harness.run("/");
    assert!(matches!(result, CommandResult::ProcessAsMessage(_)));
}

#[test]
fn unknown_command_is_reported_not_sent() {
    let mut harness = Harness::new();
    let (result, output) = harness.run("/frobnicate now");
    assert!(matches!(result, CommandResult::Continue));
    assert_eq!(
        output,
        vec!["❌ Unknown command: /frobnicate. Type /help for a list.".to_string()]
    );
}

#[test]
fn help_lists_every_command() {
    let mut harness = Harness::new();
    let (_, output) = harness.run("/help");
    for command in all_commands() {
        assert!(
            output.iter().any(|line| line.contains(command.usage)),
            "missing {}",
            command.name
        );
    }
}

#[test]
fn command_names_are_case_insensitive() {
    let mut harness = Harness::new();
    assert!(matches!(harness.run("/QUIT").0, CommandResult::Quit));
}

#[test]
fn new_and_select_switch_sessions() {
    let mut harness = Harness::new();
    harness.say("first question", "first answer");
    let first_id = harness.chat.sessions().active_session_id().unwrap().to_string();

    let (_, output) = harness.run("/new");
    assert_eq!(
        output,
        vec!["✅ New conversation started: You can now start chatting with the AI".to_string()]
    );
    assert_ne!(harness.chat.sessions().active_session_id(), Some(first_id.as_str()));

    // the older session is now second in the list
    let (_, output) = harness.run("/select 2");
    assert_eq!(harness.chat.sessions().active_session_id(), Some(first_id.as_str()));
    assert_eq!(output[0], "Switched to: first question");
    assert_eq!(output[1], "You: first question");
    assert_eq!(output[2], "Assistant: first answer");

    let (_, output) = harness.run("/select nope");
    assert_eq!(output, vec!["❌ No conversation matches 'nope'".to_string()]);
}

#[test]
fn sessions_lists_active_marker() {
    let mut harness = Harness::new();
    harness.run("/new");
    let (_, output) = harness.run("/sessions");
    assert_eq!(output.len(), 2);
    assert!(output[0].starts_with("*  1. New Chat"));
    assert!(output[1].starts_with("   2. New Chat"));
}

#[test]
fn delete_defaults_to_active_session() {
    let mut harness = Harness::new();
    let only = harness.chat.sessions().active_session_id().unwrap().to_string();

    let (_, output) = harness.run("/delete");
    assert!(output
        .iter()
        .any(|line| line.starts_with("✅ Conversation deleted")));
    assert_eq!(harness.chat.sessions().sessions().len(), 1);
    assert!(harness.chat.sessions().session(&only).is_none());
}

#[test]
fn clear_empties_active_session() {
    let mut harness = Harness::new();
    harness.say("hello", "hi");
    let (_, output) = harness.run("/clear");
    assert_eq!(
        output,
        vec!["✅ Messages cleared: The conversation is empty again".to_string()]
    );
    assert!(harness.chat.active_session().unwrap().messages.is_empty());
}

#[test]
fn model_command_shows_and_changes_model() {
    let mut harness = Harness::new();
    let (_, output) = harness.run("/model");
    assert!(output[0].contains("[anthropic/claude-3-haiku] ← selected (default)"));

    let (_, output) = harness.run("/model google/gemma-7b-it");
    assert_eq!(harness.chat.model().id, "google/gemma-7b-it");
    assert!(output[0].starts_with("✅ Now using"));

    let (_, output) = harness.run("/model openai/unknown");
    assert_eq!(harness.chat.model().id, "google/gemma-7b-it");
    assert!(output[0].starts_with("❌ Unknown model: openai/unknown"));
}

#[test]
fn models_marks_selected_entry() {
    let mut harness = Harness::new();
    harness.run("/model gryphe/mythomax-l2-13b");
    let (_, output) = harness.run("/models");
    assert_eq!(output[0], "🤖 Available Models");
    assert!(output
        .iter()
        .any(|line| line.contains("[gryphe/mythomax-l2-13b] ← selected")));
}

#[test]
fn export_writes_into_export_dir() {
    let mut harness = Harness::new();
    harness.say("Tell me about Mars", "It is red.");

    let (_, output) = harness.run("/export txt");
    assert_eq!(output.len(), 1);
    assert!(output[0].starts_with("✅ Export Successful: Chat exported as TEXT file to"));

    let path = harness
        .export_dir
        .path()
        .join("tell_me_about_mars_2024-06-06.txt");
    let contents = fs::read_to_string(path).unwrap();
    assert!(contents.contains("You:\nTell me about Mars\n\n"));
    assert!(contents.contains("Assistant:\nIt is red.\n\n"));
}

#[test]
fn export_to_explicit_path() {
    let mut harness = Harness::new();
    harness.say("Hi", "Hello");
    let target = harness.export_dir.path().join("nested").join("chat.md");

    harness.run(&format!("/export md {}", target.display()));
    let contents = fs::read_to_string(&target).unwrap();
    assert!(contents.starts_with("# Hi\n\n"));
    assert!(contents.contains("**Assistant**:\n\nHello"));
}

#[test]
fn export_of_empty_session_is_refused() {
    let mut harness = Harness::new();
    let (_, output) = harness.run("/export");
    assert_eq!(
        output,
        vec!["❌ Cannot Export: There are no messages to export.".to_string()]
    );
    assert_eq!(fs::read_dir(harness.export_dir.path()).unwrap().count(), 0);
}

#[test]
fn articles_defers_fetch_to_chat_loop() {
    let mut harness = Harness::new();
    assert!(matches!(
        harness.run("/articles").0,
        CommandResult::FetchArticles { search: None }
    ));
    assert!(matches!(
        harness.run("/articles  lunar lander ").0,
        CommandResult::FetchArticles { search: Some(s) } if s == "lunar lander"
    ));
}

#[test]
fn save_toggles_bookmark() {
    let mut harness = Harness::new();
    let (_, output) = harness.run("/save 42");
    assert_eq!(
        output,
        vec!["✅ Article saved to bookmarks: You can find it in your saved articles.".to_string()]
    );
    assert!(harness.saved.is_saved("42"));
    assert_eq!(
        harness.chat.storage().get(KEY_SAVED_ARTICLES).unwrap().as_deref(),
        Some(r#"["42"]"#)
    );

    let (_, output) = harness.run("/save 42");
    assert!(output[0].starts_with("✅ Article removed from bookmarks"));
    assert!(!harness.saved.is_saved("42"));

    let (_, output) = harness.run("/save");
    assert_eq!(output, vec!["⚠️  Usage: /save <article id>".to_string()]);
}

#[test]
fn key_stores_trimmed_token() {
    let mut harness = Harness::new();
    let (_, output) = harness.run("/key   sk-or-v1-abcdef123456  ");
    assert_eq!(
        harness.chat.storage().get(KEY_API_KEY).unwrap().as_deref(),
        Some("sk-or-v1-abcdef123456")
    );
    assert!(output[0].starts_with("✅ API key saved: Using sk-o"));

    let (_, output) = harness.run("/key");
    assert!(output[0].starts_with("❌ API key not saved"));
    assert_eq!(
        harness.chat.storage().get(KEY_API_KEY).unwrap().as_deref(),
        Some("sk-or-v1-abcdef123456")
    );
}

#[test]
fn transcript_roles_are_labelled() {
    let mut harness = Harness::new();
    harness.say("ping", "pong");
    let roles: Vec<Role> = harness
        .chat
        .active_session()
        .unwrap()
        .messages
        .iter()
        .map(|m| m.role)
        .collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
}
