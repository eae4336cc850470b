use std::sync::Arc;

use chrono::DateTime;

use crate::api::client::ApiClient;
use crate::api::models::ConversationKind;
use crate::api::service::Offline;
use crate::app::Settings;
use crate::chat::{ConversationBridge, ConversationSummary};
use crate::error::Result;
use crate::storage::ConversationCache;

const PREVIEW_CHARS: usize = 48;

fn kind_marker(kind: ConversationKind) -> char {
    match kind {
        ConversationKind::Direct => ' ',
        ConversationKind::Group => '#',
        ConversationKind::Project => '@',
    }
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > PREVIEW_CHARS {
        let cut: String = line.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}

/// One line of the conversation list.
pub fn format_row(index: usize, row: &ConversationSummary) -> String {
    let unread = if row.unread > 0 { format!(" ({})", row.unread) } else { String::new() };
    let time = row.time.as_ref().map(crate::utils::format_time).unwrap_or_default();
    let last = row.last_message.as_deref().map(preview).unwrap_or_default();
    format!(
        "{:>3} {}{}{}  {}  {}",
        index + 1,
        kind_marker(row.kind),
        row.name,
        unread,
        time,
        last
    )
    .trim_end()
    .to_string()
}

pub fn render(rows: &[ConversationSummary]) -> String {
    if rows.is_empty() {
        return "No conversations yet.".to_string();
    }
    rows.iter()
        .enumerate()
        .map(|(i, row)| format_row(i, row))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shown when the refresh failed and the list on screen comes from the cache.
pub fn stale_note(stored_at: Option<i64>) -> String {
    match stored_at.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
        Some(at) => format!("Showing conversations cached {}", crate::utils::format_time(&at)),
        None => "Showing cached conversations".to_string(),
    }
}

pub(crate) fn open_cache(settings: &Settings) -> Option<ConversationCache> {
    if !settings.cache_enabled {
        return None;
    }
    match ConversationCache::open_default() {
        Ok(cache) => Some(cache),
        Err(e) => {
            log::warn!("conversation cache unavailable: {}", e);
            None
        }
    }
}

pub async fn list(settings: &Settings) -> Result<()> {
    let client = Arc::new(ApiClient::from_settings(settings)?);
    let mut bridge = ConversationBridge::new(client, Arc::new(Offline));
    if let Some(me) = &settings.user_id {
        bridge = bridge.with_user(me.as_str().into());
    }
    let mut stored_at = None;
    if let Some(cache) = open_cache(settings) {
        stored_at = cache.last_stored_at().unwrap_or_else(|e| {
            log::warn!("could not read cache age: {}", e);
            None
        });
        bridge = bridge.with_cache(cache);
    }

    let restored = bridge.hydrate_from_cache();
    if let Err(e) = bridge.load_conversations().await {
        if restored == 0 {
            return Err(e);
        }
        eprintln!("{}, refresh failed: {e}", stale_note(stored_at));
    }

    println!("{}", render(bridge.conversations()));
    let unread = bridge.total_unread();
    if unread > 0 {
        println!("\n{unread} unread");
    }
    Ok(())
}
