//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod articles;
pub mod auth;
pub mod chat;
pub mod context;
pub mod model_list;
pub mod say;
pub mod sessions;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::articles::{run_articles, run_save_article, ListingOptions};
use crate::cli::auth::{run_auth, run_deauth};
use crate::cli::chat::run_chat;
use crate::cli::context::CliContext;
use crate::cli::model_list::model_lines;
use crate::cli::say::run_say;
use crate::cli::sessions::session_lines;
use crate::cli::settings::{SetContext, SettingError, SettingRegistry};
use crate::core::config::data::{path_display, Config};
use crate::core::export::{write_export, ExportFormat};
use crate::core::time::{format_date, now_millis};
use crate::utils::logging::{init_tracing, LOG_ENV};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ")"
);

#[derive(Parser)]
#[command(name = "blendchat")]
#[command(version = VERSION)]
#[command(about = "Chat with OpenRouter models from the terminal")]
#[command(
    long_about = "blendchat is a line-oriented chat client for OpenRouter. Conversations, \
the selected model and bookmarked space news articles are kept between runs.\n\n\
Authentication:\n\
  Use 'blendchat auth' to store your OpenRouter API key.\n\n\
Environment Variables:\n\
  OPENROUTER_API_KEY    Used when no key has been stored\n\
  BLENDCHAT_LOG         Log filter (e.g. debug, blendchat=trace)\n\n\
Commands inside the chat:\n\
  /help             List slash commands\n\
  /new              Start a new conversation\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to chat with; the choice is remembered
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Directory for conversations, bookmarks and the stored key
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Wait for whole replies instead of streaming them
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Keep everything in memory; nothing is written to the data directory
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send one prompt and print the reply
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List available models
    Models,
    /// List stored conversations
    Sessions,
    /// Export a conversation to Markdown or plain text
    Export {
        /// Position in `blendchat sessions` or conversation id
        session: String,
        #[arg(short, long, default_value = "md")]
        format: ExportFormat,
        /// File or directory to write to (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Browse space news
    Articles {
        /// Only articles whose title contains this text
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Only articles carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Only bookmarked articles
        #[arg(long)]
        saved: bool,
    },
    /// Bookmark an article, or remove the bookmark
    SaveArticle { id: String },
    /// Store the OpenRouter API key
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the configuration file location and current values
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;
    tracing::debug!(log_env = LOG_ENV, version = VERSION, "starting");

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

fn print_settings(config: &Config, config_path: &std::path::Path) {
    let registry = SettingRegistry::new();
    println!("Configuration ({})", path_display(config_path));
    for key in registry.keys_display_order() {
        if let Some(handler) = registry.get(key) {
            println!("{}", handler.format(config));
        }
    }
}

fn exit_with(err: SettingError) -> ! {
    err.print();
    std::process::exit(err.exit_code());
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let ctx = CliContext::load(&args)?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&ctx).await,
        Commands::Say { prompt } => run_say(&ctx, prompt).await,
        Commands::Models => {
            let controller = ctx.chat_controller()?;
            for line in model_lines(controller.registry(), &controller.model().id) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Sessions => {
            let controller = ctx.chat_controller()?;
            for line in session_lines(controller.sessions()) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Export {
            session,
            format,
            output,
        } => {
            let controller = ctx.chat_controller()?;
            let Some(session) = controller
                .resolve_session_ref(&session)
                .and_then(|id| controller.sessions().session(&id))
            else {
                eprintln!("❌ No conversation matches '{session}'. Run 'blendchat sessions'.");
                std::process::exit(1);
            };
            let target = match output {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            let path = write_export(session, format, &target, &format_date(now_millis()))?;
            println!(
                "✅ Chat exported as {} file to {}",
                format.label(),
                path_display(&path)
            );
            Ok(())
        }
        Commands::Articles {
            query,
            page,
            tag,
            saved,
        } => {
            run_articles(
                &ctx,
                ListingOptions {
                    search: query,
                    page,
                    tag,
                    saved_only: saved,
                },
            )
            .await
        }
        Commands::SaveArticle { id } => run_save_article(&ctx, &id),
        Commands::Auth => run_auth(&ctx),
        Commands::Deauth => run_deauth(&ctx),
        Commands::Set { key, value } => {
            let Some(key) = key else {
                print_settings(&ctx.config, &ctx.config_path);
                return Ok(());
            };
            let registry = SettingRegistry::new();
            let Some(handler) = registry.get(&key) else {
                exit_with(SettingError::UnknownKey(key));
            };
            let mut set_ctx = SetContext {
                config: &ctx.config,
                config_path: &ctx.config_path,
            };
            match handler.set(&value, &mut set_ctx) {
                Ok(message) => println!("{message}"),
                Err(err) => exit_with(err),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let registry = SettingRegistry::new();
            let Some(handler) = registry.get(&key) else {
                exit_with(SettingError::UnknownKey(key));
            };
            let mut set_ctx = SetContext {
                config: &ctx.config,
                config_path: &ctx.config_path,
            };
            match handler.unset(&mut set_ctx) {
                Ok(message) => println!("{message}"),
                Err(err) => exit_with(err),
            }
            Ok(())
        }
        Commands::Config => {
            print_settings(&ctx.config, &ctx.config_path);
            Ok(())
        }
    }
}
