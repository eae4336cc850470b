use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::models::{ConversationId, MessageId};

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    /// Emitted over the socket, waiting for the server echo.
    Pending,
    Confirmed(MessageId),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub client_id: Uuid,
    pub conversation_id: ConversationId,
    pub content: String,
    pub queued_at: DateTime<Utc>,
    pub state: DeliveryState,
}

/// Messages this client sent, keyed by their idempotency key.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<OutboxEntry>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conversation_id: ConversationId, content: String) -> Uuid {
        let client_id = Uuid::new_v4();
        self.entries.push(OutboxEntry {
            client_id,
            conversation_id,
            content,
            queued_at: Utc::now(),
            state: DeliveryState::Pending,
        });
        client_id
    }

    pub fn get(&self, client_id: Uuid) -> Option<&OutboxEntry> {
        self.entries.iter().find(|e| e.client_id == client_id)
    }

    /// Settle an entry once the server has acknowledged it. Confirmed entries
    /// leave the outbox; the message itself lives in the history.
    pub fn confirm(&mut self, client_id: Uuid, message: &MessageId) -> Option<OutboxEntry> {
        let mut entry = self.remove(client_id)?;
        log::debug!("message {} confirmed as {}", client_id, message);
        entry.state = DeliveryState::Confirmed(message.clone());
        Some(entry)
    }

    pub fn fail(&mut self, client_id: Uuid, reason: impl Into<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.client_id == client_id) {
            entry.state = DeliveryState::Failed(reason.into());
        }
    }

    /// Mark every in-flight entry failed, returning how many there were.
    pub fn fail_pending(&mut self, reason: &str) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| e.state == DeliveryState::Pending) {
            entry.state = DeliveryState::Failed(reason.to_string());
            count += 1;
        }
        count
    }

    /// Put a failed entry back in flight under the same key.
    pub fn requeue(&mut self, client_id: Uuid) -> Option<&OutboxEntry> {
        let entry = self.entries.iter_mut().find(|e| e.client_id == client_id)?;
        entry.state = DeliveryState::Pending;
        Some(entry)
    }

    pub fn remove(&mut self, client_id: Uuid) -> Option<OutboxEntry> {
        let pos = self.entries.iter().position(|e| e.client_id == client_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn pending_for<'a>(
        &'a self,
        conversation: &'a ConversationId,
    ) -> impl Iterator<Item = &'a OutboxEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| &e.conversation_id == conversation)
    }

    pub fn failed(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, DeliveryState::Failed(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_removes_entry() {
        let mut outbox = Outbox::new();
        let key = outbox.push(ConversationId::new("1"), "hi".into());
        assert_eq!(outbox.get(key).unwrap().state, DeliveryState::Pending);
        let settled = outbox.confirm(key, &MessageId::new("m1")).unwrap();
        assert_eq!(settled.state, DeliveryState::Confirmed(MessageId::new("m1")));
        assert!(outbox.is_empty());
        assert!(outbox.confirm(key, &MessageId::new("m1")).is_none());
    }

    #[test]
    fn fail_pending_leaves_failed_entries_alone() {
        let mut outbox = Outbox::new();
        let a = outbox.push(ConversationId::new("1"), "a".into());
        let b = outbox.push(ConversationId::new("1"), "b".into());
        outbox.fail(b, "HTTP 500");
        assert_eq!(outbox.fail_pending("connection lost"), 1);
        assert_eq!(outbox.get(a).unwrap().state, DeliveryState::Failed("connection lost".into()));
        assert_eq!(outbox.get(b).unwrap().state, DeliveryState::Failed("HTTP 500".into()));
        assert_eq!(outbox.fail_pending("connection lost"), 0);
    }

    #[test]
    fn failed_entries_stay_until_removed() {
        let mut outbox = Outbox::new();
        let a = outbox.push(ConversationId::new("1"), "a".into());
        let _b = outbox.push(ConversationId::new("2"), "b".into());
        outbox.fail(a, "HTTP 500");
        assert_eq!(outbox.failed().count(), 1);
        assert_eq!(outbox.pending_for(&ConversationId::new("2")).count(), 1);
        let removed = outbox.remove(a).unwrap();
        assert_eq!(removed.state, DeliveryState::Failed("HTTP 500".into()));
        assert_eq!(outbox.len(), 1);
    }
}
