//! `blendchat auth` and `blendchat deauth`.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::credentials::{self, CredentialSource, API_KEY_ENV};
use crate::core::storage::KeyValueStore;

use super::context::CliContext;

pub const KEY_PROMPT: &str = "Paste your OpenRouter API key (https://openrouter.ai/keys): ";

/// Ask for a key on `input` and store it. Returns `false` when the user
/// entered nothing.
pub fn prompt_and_store<R: BufRead, W: Write>(
    storage: &dyn KeyValueStore,
    input: &mut R,
    output: &mut W,
) -> Result<bool, Box<dyn Error>> {
    write!(output, "{KEY_PROMPT}")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    if line.trim().is_empty() {
        writeln!(output, "⚠️  No key entered, nothing changed")?;
        return Ok(false);
    }

    credentials::store(storage, &line)?;
    writeln!(
        output,
        "✅ API key saved ({})",
        credentials::mask(line.trim())
    )?;
    Ok(true)
}

pub fn run_auth(ctx: &CliContext) -> Result<(), Box<dyn Error>> {
    if let Some(existing) = credentials::resolve(ctx.storage.as_ref()) {
        println!(
            "Current key: {} (from {})",
            credentials::mask(&existing.token),
            existing.source
        );
    }
    let stdin = io::stdin();
    prompt_and_store(ctx.storage.as_ref(), &mut stdin.lock(), &mut io::stdout())?;
    Ok(())
}

pub fn run_deauth(ctx: &CliContext) -> Result<(), Box<dyn Error>> {
    if credentials::clear(ctx.storage.as_ref())? {
        println!("✅ Stored API key removed");
    } else {
        println!("No stored API key");
    }
    if let Some(remaining) = credentials::resolve(ctx.storage.as_ref()) {
        if remaining.source == CredentialSource::Environment {
            println!("   {API_KEY_ENV} is still set and will be used");
        }
    }
    Ok(())
}
