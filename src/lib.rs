//! blendchat is a line-oriented chat client for OpenRouter with a space news
//! reader on the side.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversations, persistence, model selection, the send
//!   flow with its stream bookkeeping, and export.
//! - [`api`] holds the HTTP clients: chat completions (streamed or whole)
//!   and the Spaceflight News feed.
//! - [`commands`] implements slash-command parsing and execution used by
//!   the chat loop.
//! - [`cli`] parses arguments and runs the subcommands, including the
//!   interactive loop.
//! - [`utils`] collects URL, header and logging helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod utils;
