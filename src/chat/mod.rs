//! Conversation list, active history and the socket bridge that keeps them fresh.

pub mod bridge;
pub mod outbox;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::models::{
    Attachment, ConversationDto, ConversationId, ConversationKind, MessageDto, MessageId,
    Participant, ProjectId, UserId,
};

pub use bridge::ConversationBridge;
pub use outbox::{DeliveryState, Outbox, OutboxEntry};

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub name: String,
    pub kind: ConversationKind,
    pub participants: Vec<Participant>,
    pub last_message: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub unread: u32,
    pub project: Option<ProjectId>,
}

impl ConversationSummary {
    pub fn from_dto(dto: ConversationDto, me: Option<&UserId>) -> Self {
        let name = display_name(&dto, me);
        let project = dto.project().cloned();
        Self {
            id: dto.id,
            name,
            kind: dto.kind,
            participants: dto.participants,
            last_message: dto.last_message_content,
            time: dto.last_message_created_at,
            unread: dto.unread_count,
            project,
        }
    }
}

fn display_name(dto: &ConversationDto, me: Option<&UserId>) -> String {
    if let Some(title) = dto.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    let others: Vec<String> = dto
        .participants
        .iter()
        .filter(|p| Some(&p.user_id) != me)
        .map(Participant::display_name)
        .collect();
    if !others.is_empty() {
        return others.join(", ");
    }
    match dto.kind {
        ConversationKind::Direct => "Conversation".to_string(),
        ConversationKind::Group => "Group chat".to_string(),
        ConversationKind::Project => "Project chat".to_string(),
    }
}

/// A message as shown in the active conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub attachment: Option<Attachment>,
    pub client_id: Option<Uuid>,
}

impl ChatMessage {
    pub fn from_dto(dto: MessageDto, conversation: &ConversationId) -> Self {
        let sender_name = crate::utils::full_name(&dto.first_name, &dto.last_name)
            .unwrap_or_else(|| dto.sender_id.to_string());
        Self {
            id: dto.id,
            conversation_id: dto.conversation_id.unwrap_or_else(|| conversation.clone()),
            sender_id: dto.sender_id,
            sender_name,
            content: dto.content,
            sent_at: dto.created_at,
            attachment: dto.attachments.into_iter().next(),
            client_id: dto.client_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dto(value: serde_json::Value) -> ConversationDto {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn title_wins_over_participants() {
        let s = ConversationSummary::from_dto(
            dto(json!({"id": 1, "title": " Site meeting ", "participants": [{"id": 2, "first_name": "Bo"}]})),
            None,
        );
        assert_eq!(s.name, "Site meeting");
    }

    #[test]
    fn untitled_direct_chat_is_named_after_the_other_person() {
        let s = ConversationSummary::from_dto(
            dto(json!({
                "id": 1,
                "participants": [
                    {"id": 10, "first_name": "Me", "last_name": "Self"},
                    {"id": 11, "first_name": "Dana", "last_name": "Cole"}
                ]
            })),
            Some(&UserId::new("10")),
        );
        assert_eq!(s.name, "Dana Cole");
    }

    #[test]
    fn empty_project_chat_falls_back_to_kind() {
        let s = ConversationSummary::from_dto(
            dto(json!({"id": 1, "type": "project", "related_project_id": "p9"})),
            None,
        );
        assert_eq!(s.name, "Project chat");
        assert_eq!(s.project, Some(ProjectId::new("p9")));
    }

    #[test]
    fn message_keeps_only_first_attachment() {
        let m: MessageDto = serde_json::from_value(json!({
            "id": 5,
            "sender_id": 2,
            "content": "plans attached",
            "created_at": "2025-01-01T00:00:00Z",
            "attachments": [{"url": "https://f/1.pdf"}, {"url": "https://f/2.pdf"}]
        }))
        .unwrap();
        let msg = ChatMessage::from_dto(m, &ConversationId::new("3"));
        assert_eq!(msg.conversation_id, ConversationId::new("3"));
        assert_eq!(msg.sender_name, "2");
        assert_eq!(msg.attachment.unwrap().url, "https://f/1.pdf");
    }
}
