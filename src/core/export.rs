//! Session export to Markdown and plain text.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tempfile::NamedTempFile;

use crate::core::message::Role;
use crate::core::session::ChatSession;
use crate::core::time::format_date;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "MARKDOWN",
            ExportFormat::Text => "TEXT",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(format!("unknown export format '{other}' (use md or txt)")),
        }
    }
}

#[derive(Debug)]
pub enum ExportError {
    /// Nothing to export.
    EmptySession,
    Io { path: PathBuf, source: std::io::Error },
    Persist { path: PathBuf, source: tempfile::PersistError },
    /// The Markdown being read back does not have the exported layout.
    Malformed(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::EmptySession => write!(f, "There are no messages to export."),
            ExportError::Io { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
            ExportError::Persist { path, source } => {
                write!(f, "Failed to write {}: {source}", path.display())
            }
            ExportError::Malformed(reason) => write!(f, "Not an exported chat: {reason}"),
        }
    }
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExportError::Io { source, .. } => Some(source),
            ExportError::Persist { source, .. } => Some(source),
            _ => None,
        }
    }
}

const MARKDOWN_SEPARATOR: &str = "\n\n---\n\n";

fn markdown_label(role: Role) -> String {
    format!("**{}**:\n\n", role.sender_label())
}

pub fn format_session(session: &ChatSession, format: ExportFormat) -> String {
    let mut out = format!(
        "# {}\n\nDate: {}\n\n",
        session.title,
        format_date(session.created_at)
    );
    for message in &session.messages {
        let sender = message.role.sender_label();
        match format {
            ExportFormat::Markdown => {
                out.push_str(&format!("**{sender}**:\n\n{}{MARKDOWN_SEPARATOR}", message.content));
            }
            ExportFormat::Text => {
                out.push_str(&format!("{sender}:\n{}\n\n", message.content));
            }
        }
    }
    out
}

/// `<sanitized title>_<YYYY-MM-DD>.<ext>`; every character outside
/// `[A-Za-z0-9]` becomes `_` before lowercasing.
pub fn export_file_name(title: &str, date: &str, format: ExportFormat) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}_{date}.{}", format.extension())
}

/// Write the export under `target`. A directory target gets the default
/// file name; anything else is used as the file path. The file only
/// appears once it has been written completely.
pub fn write_export(
    session: &ChatSession,
    format: ExportFormat,
    target: &Path,
    today: &str,
) -> Result<PathBuf, ExportError> {
    if session.messages.is_empty() {
        return Err(ExportError::EmptySession);
    }

    let path = if target.is_dir() {
        target.join(export_file_name(&session.title, today, format))
    } else {
        target.to_path_buf()
    };
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.clone(),
        source,
    };

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new_in("."),
    }
    .map_err(io_err)?;

    temp_file
        .write_all(format_session(session, format).as_bytes())
        .map_err(io_err)?;
    temp_file.as_file_mut().sync_all().map_err(io_err)?;
    temp_file
        .persist(&path)
        .map_err(|source| ExportError::Persist {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub title: String,
    pub date: String,
    pub messages: Vec<TranscriptEntry>,
}

fn strip_label(text: &str) -> Option<(Role, &str)> {
    [Role::User, Role::Assistant]
        .into_iter()
        .find_map(|role| text.strip_prefix(&markdown_label(role)).map(|rest| (role, rest)))
}

/// Read back a Markdown export.
///
/// A separator only ends a message when it is followed by the next sender
/// label or the end of input, so content containing `---` survives intact.
pub fn parse_markdown(input: &str) -> Result<Transcript, ExportError> {
    let rest = input
        .strip_prefix("# ")
        .ok_or_else(|| ExportError::Malformed("missing title".to_string()))?;
    // Titles may span paragraphs; the date line ends them.
    let (title, rest) = rest
        .split_once("\n\nDate: ")
        .ok_or_else(|| ExportError::Malformed("missing date line".to_string()))?;
    let (date, mut rest) = rest
        .split_once("\n\n")
        .ok_or_else(|| ExportError::Malformed("unterminated date line".to_string()))?;

    let mut messages = Vec::new();
    while !rest.is_empty() {
        let (role, body) = strip_label(rest)
            .ok_or_else(|| ExportError::Malformed("expected a sender label".to_string()))?;

        let mut search_from = 0;
        let end = loop {
            let Some(offset) = body[search_from..].find(MARKDOWN_SEPARATOR) else {
                return Err(ExportError::Malformed("unterminated message".to_string()));
            };
            let candidate = search_from + offset;
            let after = &body[candidate + MARKDOWN_SEPARATOR.len()..];
            if after.is_empty() || strip_label(after).is_some() {
                break candidate;
            }
            search_from = candidate + 1;
        };

        messages.push(TranscriptEntry {
            role,
            content: body[..end].to_string(),
        });
        rest = &body[end + MARKDOWN_SEPARATOR.len()..];
    }

    Ok(Transcript {
        title: title.to_string(),
        date: date.to_string(),
        messages,
    })
}
