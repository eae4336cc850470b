use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::models::{ConversationDto, ConversationId, MessageDto, MessageId};

/// Frames pushed by the gateway, `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message:new")]
    MessageNew(IncomingMessage),
    #[serde(rename = "conversation:updated")]
    ConversationUpdated(ConversationDto),
    #[serde(rename = "message:deleted")]
    MessageDeleted(DeletedMessage),
}

/// A new message always names its conversation, unlike history entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub conversation_id: ConversationId,
    #[serde(flatten)]
    pub message: MessageDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedMessage {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
}

/// Commands the client emits over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    #[serde(rename = "message:send")]
    SendMessage {
        conversation_id: ConversationId,
        content: String,
        client_id: Uuid,
    },
    #[serde(rename = "conversation:join")]
    JoinConversation { conversation_id: ConversationId },
}

/// What the socket link reports to whoever consumes its event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected,
    Disconnected,
    Server(ServerEvent),
}

impl ServerEvent {
    /// Decode one text frame. `Ok(None)` for events this client does not handle.
    pub fn decode(frame: &str) -> Result<Option<Self>, serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope<'a> {
            #[serde(borrow)]
            event: std::borrow::Cow<'a, str>,
        }

        let envelope: Envelope = serde_json::from_str(frame)?;
        match envelope.event.as_ref() {
            "message:new" | "conversation:updated" | "message:deleted" => {
                serde_json::from_str(frame).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            ServerEvent::MessageNew(m) => &m.conversation_id,
            ServerEvent::ConversationUpdated(c) => &c.id,
            ServerEvent::MessageDeleted(d) => &d.conversation_id,
        }
    }
}
