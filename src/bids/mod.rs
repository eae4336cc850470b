//! Bid proposals: the composer form, its rules, and the owner's bid list.

pub mod composer;
pub mod manager;
pub mod validation;

pub use composer::{BidComposer, LineItemDraft};
pub use manager::BidManager;
