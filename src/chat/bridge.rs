use std::sync::Arc;

use uuid::Uuid;

use crate::api::events::{ClientCommand, IncomingMessage, ServerEvent, SocketEvent};
use crate::api::models::{
    ConversationDto, ConversationId, MessageType, OutgoingMessage, ProjectId, UserId,
};
use crate::api::service::{ChatService, SocketLink};
use crate::chat::outbox::{DeliveryState, Outbox, OutboxEntry};
use crate::chat::{ChatMessage, ConversationSummary};
use crate::error::{ClientError, Result};
use crate::storage::ConversationCache;

/// View-model for the messaging screen.
///
/// Holds the conversation list, the history of the one open conversation and
/// the outbox, and applies REST snapshots and socket events to them. Every
/// mutation goes through `&mut self`, so a history response always belongs to
/// the selection that requested it.
pub struct ConversationBridge {
    chat: Arc<dyn ChatService>,
    socket: Arc<dyn SocketLink>,
    me: Option<UserId>,
    conversations: Vec<ConversationSummary>,
    active: Option<ConversationId>,
    messages: Vec<ChatMessage>,
    outbox: Outbox,
    notice: Option<String>,
    cache: Option<ConversationCache>,
}

impl ConversationBridge {
    pub fn new(chat: Arc<dyn ChatService>, socket: Arc<dyn SocketLink>) -> Self {
        Self {
            chat,
            socket,
            me: None,
            conversations: Vec::new(),
            active: None,
            messages: Vec::new(),
            outbox: Outbox::new(),
            notice: None,
            cache: None,
        }
    }

    /// Used to name untitled conversations after the other participants.
    pub fn with_user(mut self, me: UserId) -> Self {
        self.me = Some(me);
        self
    }

    pub fn with_cache(mut self, cache: ConversationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations.iter().map(|c| c.unread).sum()
    }

    /// Show the cached list until the first fetch lands. Returns how many rows were restored.
    pub fn hydrate_from_cache(&mut self) -> usize {
        let Some(cache) = &self.cache else {
            return 0;
        };
        match cache.load() {
            Ok(cached) if self.conversations.is_empty() => {
                self.conversations = cached;
                self.conversations.len()
            }
            Ok(_) => 0,
            Err(e) => {
                log::warn!("could not read conversation cache: {}", e);
                0
            }
        }
    }

    /// Replace the conversation list with a fresh snapshot. On failure the
    /// previous list stays in place.
    pub async fn load_conversations(&mut self) -> Result<()> {
        let list = match self.chat.get_conversations().await {
            Ok(list) => list,
            Err(e) => {
                log::warn!("loading conversations failed: {}", e);
                self.notice = Some(format!("Failed to load conversations: {}", e));
                return Err(e);
            }
        };
        let me = self.me.as_ref();
        self.conversations = list
            .into_iter()
            .map(|dto| ConversationSummary::from_dto(dto, me))
            .collect();
        if let Some(active) = self.active.clone() {
            if let Some(c) = self.find_mut(&active) {
                c.unread = 0;
            }
        }
        log::debug!("loaded {} conversations", self.conversations.len());
        self.persist();
        Ok(())
    }

    /// Open `id`: drop the old history, mark read once, then fetch the new history.
    pub async fn select_conversation(&mut self, id: &ConversationId) -> Result<()> {
        self.active = Some(id.clone());
        self.messages.clear();
        if let Some(c) = self.find_mut(id) {
            c.unread = 0;
        }
        self.join(id);
        if let Err(e) = self.chat.mark_read(id).await {
            log::warn!("marking conversation {} read failed: {}", id, e);
        }
        self.reload_active().await
    }

    pub fn close_conversation(&mut self) {
        self.active = None;
        self.messages.clear();
    }

    async fn reload_active(&mut self) -> Result<()> {
        let Some(id) = self.active.clone() else {
            return Ok(());
        };
        match self.chat.get_messages(&id).await {
            Ok(history) => {
                self.messages = history
                    .into_iter()
                    .map(|dto| ChatMessage::from_dto(dto, &id))
                    .collect();
                Ok(())
            }
            Err(e) => {
                log::warn!("loading messages for {} failed: {}", id, e);
                self.notice = Some(format!("Failed to load messages: {}", e));
                Err(e)
            }
        }
    }

    fn join(&self, id: &ConversationId) {
        if !self.socket.is_connected() {
            return;
        }
        let command = ClientCommand::JoinConversation {
            conversation_id: id.clone(),
        };
        if let Err(e) = self.socket.emit(command) {
            log::warn!("joining conversation {} failed: {}", id, e);
        }
    }

    pub async fn handle_socket_event(&mut self, event: SocketEvent) -> Result<()> {
        match event {
            SocketEvent::Connected => {
                log::info!("real-time connection up, resyncing");
                self.load_conversations().await?;
                if let Some(id) = self.active.clone() {
                    self.join(&id);
                    self.reload_active().await?;
                }
                Ok(())
            }
            SocketEvent::Disconnected => {
                // Echoes for in-flight sends will never arrive on this link.
                let lost = self.outbox.fail_pending("connection lost");
                self.notice = Some(if lost > 0 {
                    format!(
                        "Real-time connection lost; {lost} message(s) not confirmed, use /retry to resend over HTTP"
                    )
                } else {
                    "Real-time connection lost; messages will be sent over HTTP".to_string()
                });
                Ok(())
            }
            SocketEvent::Server(ServerEvent::MessageNew(incoming)) => {
                self.on_message_new(incoming).await
            }
            SocketEvent::Server(ServerEvent::ConversationUpdated(dto)) => {
                self.on_conversation_updated(dto).await
            }
            SocketEvent::Server(ServerEvent::MessageDeleted(deleted)) => {
                if self.active.as_ref() == Some(&deleted.conversation_id) {
                    self.messages.retain(|m| m.id != deleted.message_id);
                }
                Ok(())
            }
        }
    }

    async fn on_message_new(&mut self, incoming: IncomingMessage) -> Result<()> {
        let conversation = incoming.conversation_id;
        let is_active = self.active.as_ref() == Some(&conversation);
        let idx = self.position(&conversation);
        if idx.is_none() && !is_active {
            log::info!("message for unknown conversation {}, resyncing", conversation);
            return self.load_conversations().await;
        }

        let message = ChatMessage::from_dto(incoming.message, &conversation);
        // The open conversation may be missing from the list, e.g. opened by raw id.
        if let Some(summary) = idx.map(|i| &mut self.conversations[i]) {
            summary.last_message = Some(message.content.clone());
            summary.time = Some(message.sent_at);
            if !is_active {
                summary.unread = summary.unread.saturating_add(1);
            }
        }

        if let Some(key) = message.client_id {
            self.outbox.confirm(key, &message.id);
        }
        if is_active {
            self.messages.push(message);
        }
        Ok(())
    }

    async fn on_conversation_updated(&mut self, dto: ConversationDto) -> Result<()> {
        let Some(idx) = self.position(&dto.id) else {
            log::info!("update for unknown conversation {}, resyncing", dto.id);
            return self.load_conversations().await;
        };
        let mut summary = ConversationSummary::from_dto(dto, self.me.as_ref());
        if self.active.as_ref() == Some(&summary.id) {
            summary.unread = 0;
        }
        self.conversations[idx] = summary;
        Ok(())
    }

    /// Send `text` to `conversation`, returning the outbox key.
    pub async fn send_message(&mut self, conversation: &ConversationId, text: &str) -> Result<Uuid> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let key = self.outbox.push(conversation.clone(), content.to_string());
        self.deliver(key).await.map(|_| key)
    }

    pub async fn retry_failed(&mut self, key: Uuid) -> Result<()> {
        match self.outbox.get(key).map(|e| &e.state) {
            Some(DeliveryState::Failed(_)) => {}
            _ => return Err(ClientError::Invalid(format!("no failed message {}", key))),
        }
        self.outbox.requeue(key);
        self.deliver(key).await
    }

    pub fn discard_failed(&mut self, key: Uuid) -> Option<OutboxEntry> {
        match self.outbox.get(key)?.state {
            DeliveryState::Failed(_) => self.outbox.remove(key),
            _ => None,
        }
    }

    async fn deliver(&mut self, key: Uuid) -> Result<()> {
        let Some(entry) = self.outbox.get(key).cloned() else {
            return Err(ClientError::Invalid(format!("no queued message {}", key)));
        };

        if self.socket.is_connected() {
            let command = ClientCommand::SendMessage {
                conversation_id: entry.conversation_id.clone(),
                content: entry.content.clone(),
                client_id: key,
            };
            match self.socket.emit(command) {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("socket send failed, falling back to HTTP: {}", e),
            }
        }

        let body = OutgoingMessage {
            content: entry.content,
            message_type: MessageType::Text,
            attachments: Vec::new(),
            client_id: key,
        };
        match self.chat.send_message(&entry.conversation_id, &body).await {
            Ok(dto) => {
                let message = ChatMessage::from_dto(dto, &entry.conversation_id);
                self.outbox.confirm(key, &message.id);
                if self.active.as_ref() == Some(&entry.conversation_id)
                    && !self.messages.iter().any(|m| m.id == message.id)
                {
                    self.messages.push(message);
                }
                if let Err(e) = self.load_conversations().await {
                    log::warn!("resync after send failed: {}", e);
                }
                Ok(())
            }
            Err(e) => {
                self.outbox.fail(key, e.to_string());
                self.notice = Some(format!("Message not sent: {}", e));
                Err(e)
            }
        }
    }

    pub async fn start_direct(&mut self, user: &UserId) -> Result<ConversationId> {
        let created = self.chat.start_direct(user).await;
        self.adopt(created).await
    }

    pub async fn create_group(&mut self, title: &str, members: &[UserId]) -> Result<ConversationId> {
        let created = self.chat.create_group(title, members).await;
        self.adopt(created).await
    }

    pub async fn open_project_conversation(&mut self, project: &ProjectId) -> Result<ConversationId> {
        let created = self.chat.ensure_project_conversation(project).await;
        self.adopt(created).await
    }

    /// Resync after the backend created (or found) a conversation, then open it.
    async fn adopt(&mut self, created: Result<ConversationDto>) -> Result<ConversationId> {
        let dto = created.map_err(|e| {
            self.notice = Some(format!("Could not open conversation: {}", e));
            e
        })?;
        let id = dto.id.clone();
        if self.load_conversations().await.is_err() && self.position(&id).is_none() {
            self.conversations
                .insert(0, ConversationSummary::from_dto(dto, self.me.as_ref()));
        }
        self.select_conversation(&id).await?;
        Ok(id)
    }

    fn position(&self, id: &ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| &c.id == id)
    }

    fn find_mut(&mut self, id: &ConversationId) -> Option<&mut ConversationSummary> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    fn persist(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.store(&self.conversations) {
                log::warn!("could not cache conversations: {}", e);
            }
        }
    }
}
