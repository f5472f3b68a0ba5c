//! Session listing.

use chrono::{DateTime, Local, Utc};

use crate::core::session_store::SessionStore;

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// One line per session, numbered from 1 in list order (newest first).
pub fn session_lines(store: &SessionStore) -> Vec<String> {
    let active = store.active_session_id();
    store
        .sessions()
        .iter()
        .enumerate()
        .map(|(index, session)| {
            let marker = if Some(session.id.as_str()) == active {
                "*"
            } else {
                " "
            };
            let count = session.messages.len();
            format!(
                "{marker} {:>2}. {} ({} message{}, updated {}) [{}]",
                index + 1,
                session.title,
                count,
                if count == 1 { "" } else { "s" },
                format_timestamp(session.updated_at),
                session.id
            )
        })
        .collect()
}
