//! Diagnostic logging setup.
//!
//! Output goes to stderr by default, which would interleave with the chat
//! transcript, so the default level is `warn`. `--log-file` redirects
//! everything to a file instead.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "BLENDCHAT_LOG";
const DEFAULT_FILTER: &str = "warn";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter("debug"))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter(DEFAULT_FILTER))
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}
