//! Seams between the view-models and their remote collaborators.
//!
//! `ApiClient` and `SocketClient` are the real implementations; tests plug in
//! recording doubles.

use async_trait::async_trait;

use crate::api::events::ClientCommand;
use crate::api::models::{
    BidDto, BidId, BidItem, ConversationDto, ConversationId, MessageDto, NewBid, OutgoingMessage,
    ProjectId, ProjectListing, UserId,
};
use crate::error::Result;

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn get_conversations(&self) -> Result<Vec<ConversationDto>>;

    async fn get_messages(&self, conversation: &ConversationId) -> Result<Vec<MessageDto>>;

    async fn send_message(
        &self,
        conversation: &ConversationId,
        message: &OutgoingMessage,
    ) -> Result<MessageDto>;

    async fn mark_read(&self, conversation: &ConversationId) -> Result<()>;

    async fn start_direct(&self, user: &UserId) -> Result<ConversationDto>;

    async fn create_group(&self, title: &str, members: &[UserId]) -> Result<ConversationDto>;

    async fn ensure_project_conversation(&self, project: &ProjectId) -> Result<ConversationDto>;
}

#[async_trait]
pub trait BidService: Send + Sync {
    async fn get_my_bids(&self) -> Result<Vec<BidDto>>;

    async fn get_bid_detail(&self, bid: &BidId) -> Result<BidDto>;

    async fn create_bid(&self, bid: &NewBid) -> Result<BidDto>;

    async fn update_bid_items(&self, bid: &BidId, items: &[BidItem]) -> Result<BidDto>;

    async fn finalize_bid_submission(&self, bid: &BidId) -> Result<BidDto>;

    async fn withdraw_bid(&self, bid: &BidId) -> Result<BidDto>;

    async fn delete_bid(&self, bid: &BidId) -> Result<()>;
}

#[async_trait]
pub trait DiscoveryService: Send + Sync {
    async fn get_project_discovery(&self) -> Result<Vec<ProjectListing>>;
}

/// The outgoing half of the real-time channel.
pub trait SocketLink: Send + Sync {
    fn is_connected(&self) -> bool;

    fn emit(&self, command: ClientCommand) -> Result<()>;
}

/// Stand-in link for sessions that run without a socket; every send goes over REST.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl SocketLink for Offline {
    fn is_connected(&self) -> bool {
        false
    }

    fn emit(&self, _command: ClientCommand) -> Result<()> {
        Err(crate::error::ClientError::SocketClosed)
    }
}
