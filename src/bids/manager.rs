use std::sync::Arc;

use crate::api::models::{BidDto, BidId, BidStatus};
use crate::api::service::BidService;
use crate::bids::composer::BidComposer;
use crate::error::{ClientError, Result};

/// The "my bids" list and the one-shot lifecycle calls on it.
pub struct BidManager {
    service: Arc<dyn BidService>,
    bids: Vec<BidDto>,
}

impl BidManager {
    pub fn new(service: Arc<dyn BidService>) -> Self {
        Self {
            service,
            bids: Vec::new(),
        }
    }

    pub fn bids(&self) -> &[BidDto] {
        &self.bids
    }

    pub fn find(&self, id: &BidId) -> Option<&BidDto> {
        self.bids.iter().find(|b| &b.id == id)
    }

    pub fn with_status(&self, status: BidStatus) -> impl Iterator<Item = &BidDto> {
        self.bids.iter().filter(move |b| b.status == status)
    }

    pub async fn refresh(&mut self) -> Result<&[BidDto]> {
        self.bids = self.service.get_my_bids().await?;
        Ok(&self.bids)
    }

    pub async fn detail(&mut self, id: &BidId) -> Result<BidDto> {
        let bid = self.service.get_bid_detail(id).await?;
        self.upsert(bid.clone());
        Ok(bid)
    }

    /// Replace the line items of a draft. Non-draft bids are refused locally.
    pub async fn update_items(&mut self, id: &BidId, composer: &BidComposer) -> Result<BidDto> {
        let cached = self.find(id).map(|b| b.status);
        let status = match cached {
            Some(status) => status,
            None => self.detail(id).await?.status,
        };
        if !status.is_editable() {
            return Err(ClientError::BidLocked {
                id: id.clone(),
                status,
            });
        }
        let items = composer.prepare_items().map_err(ClientError::Invalid)?;
        let updated = self.service.update_bid_items(id, &items).await?;
        self.upsert(updated.clone());
        Ok(updated)
    }

    /// Submit an existing draft.
    pub async fn finalize(&mut self, id: &BidId) -> Result<BidDto> {
        let bid = self.service.finalize_bid_submission(id).await?;
        self.upsert(bid.clone());
        Ok(bid)
    }

    pub async fn withdraw(&mut self, id: &BidId) -> Result<BidDto> {
        let bid = self.service.withdraw_bid(id).await?;
        self.upsert(bid.clone());
        Ok(bid)
    }

    pub async fn delete(&mut self, id: &BidId) -> Result<()> {
        self.service.delete_bid(id).await?;
        self.bids.retain(|b| &b.id != id);
        Ok(())
    }

    fn upsert(&mut self, bid: BidDto) {
        match self.bids.iter_mut().find(|b| b.id == bid.id) {
            Some(existing) => *existing = bid,
            None => self.bids.push(bid),
        }
    }
}
