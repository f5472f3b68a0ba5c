//! Bearer token for the completion API.
//!
//! The token lives in the key-value store. When nothing is stored, the
//! `OPENROUTER_API_KEY` environment variable is used instead.

use std::error::Error;
use std::fmt;

use crate::core::storage::{KeyValueStore, StoreError, KEY_API_KEY};

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    Stored,
    Environment,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Stored => write!(f, "saved key"),
            CredentialSource::Environment => write!(f, "{API_KEY_ENV}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
}

#[derive(Debug)]
pub enum CredentialError {
    Empty,
    Store(StoreError),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Empty => write!(f, "API key cannot be empty"),
            CredentialError::Store(err) => write!(f, "Failed to store API key: {err}"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Empty => None,
            CredentialError::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for CredentialError {
    fn from(err: StoreError) -> Self {
        CredentialError::Store(err)
    }
}

pub fn resolve(storage: &dyn KeyValueStore) -> Option<Credential> {
    resolve_with_env(storage, std::env::var(API_KEY_ENV).ok())
}

/// Stored token first, then `env_value`. Blank values count as absent.
pub fn resolve_with_env(
    storage: &dyn KeyValueStore,
    env_value: Option<String>,
) -> Option<Credential> {
    let stored = storage.get(KEY_API_KEY).unwrap_or_else(|err| {
        tracing::warn!("Failed to read stored API key: {err}");
        None
    });

    let non_blank = |value: String| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    if let Some(token) = stored.and_then(non_blank) {
        return Some(Credential {
            token,
            source: CredentialSource::Stored,
        });
    }
    env_value.and_then(non_blank).map(|token| Credential {
        token,
        source: CredentialSource::Environment,
    })
}

pub fn store(storage: &dyn KeyValueStore, token: &str) -> Result<(), CredentialError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CredentialError::Empty);
    }
    storage.set(KEY_API_KEY, token)?;
    Ok(())
}

/// Returns whether a stored token existed.
pub fn clear(storage: &dyn KeyValueStore) -> Result<bool, StoreError> {
    let existed = storage.get(KEY_API_KEY)?.is_some();
    storage.remove(KEY_API_KEY)?;
    Ok(existed)
}

/// Show only the first and last four characters.
pub fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
