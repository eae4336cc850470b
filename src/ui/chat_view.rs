use crate::api::models::UserId;
use crate::chat::{ChatMessage, ConversationBridge, DeliveryState, OutboxEntry};

pub fn format_message(message: &ChatMessage, me: Option<&UserId>) -> String {
    let who = if Some(&message.sender_id) == me { "You" } else { message.sender_name.as_str() };
    let time = crate::utils::format_time(&message.sent_at);
    let mut line = format!("[{}] {}: {}", time, who, message.content);
    if let Some(att) = &message.attachment {
        let label = att.name.as_deref().unwrap_or(att.url.as_str());
        line.push_str(&format!(" [attachment: {}]", label));
    }
    line
}

pub fn format_outbox_entry(entry: &OutboxEntry) -> Option<String> {
    let short = entry.client_id.simple().to_string();
    let short = &short[..8];
    match &entry.state {
        DeliveryState::Pending => Some(format!("  … sending ({short}): {}", entry.content)),
        DeliveryState::Failed(reason) => Some(format!(
            "  ! not sent ({short}): {}  [{}]",
            entry.content, reason
        )),
        DeliveryState::Confirmed(_) => None,
    }
}

/// History of the open conversation followed by anything still in flight.
pub fn render(bridge: &ConversationBridge, me: Option<&UserId>) -> String {
    let Some(active) = bridge.active() else {
        return "No conversation open.".to_string();
    };
    let title = bridge
        .conversation(active)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| active.to_string());

    let mut lines = vec![format!("== {} ==", title)];
    if bridge.messages().is_empty() {
        lines.push("(no messages)".to_string());
    }
    lines.extend(bridge.messages().iter().map(|m| format_message(m, me)));
    lines.extend(
        bridge
            .outbox()
            .pending_for(active)
            .filter_map(format_outbox_entry),
    );
    lines.join("\n")
}
