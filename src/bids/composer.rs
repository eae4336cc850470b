use std::path::Path;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::api::models::{BidDto, BidItem, NewBid, ProjectId};
use crate::api::service::BidService;
use crate::bids::validation;
use crate::error::{ClientError, SubmitError};

/// Draft files may write prices as `1200`, `1200.5` or `"1,200.50"`.
fn price_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}

/// A line item as typed by the user; price stays text until submit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "price_text")]
    pub price: String,
}

impl LineItemDraft {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price: price.into(),
        }
    }
}

/// Parse user-entered money. Blank means zero; `None` means not a number.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
}

/// Trimmed, coerced form of the composer, ready for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBid {
    pub items: Vec<NormalizedItem>,
    pub notes: Option<String>,
    pub credentials: Option<String>,
    pub relevant_experience: Option<String>,
}

impl NormalizedBid {
    pub fn total(&self) -> f64 {
        self.items.iter().filter_map(|i| i.price).sum()
    }

    fn line_items(&self) -> Vec<BidItem> {
        self.items
            .iter()
            .map(|i| BidItem {
                name: i.name.clone(),
                description: i.description.clone(),
                price: i.price.unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct DraftFile {
    #[serde(default)]
    notes: String,
    #[serde(default)]
    credentials: String,
    #[serde(default)]
    relevant_experience: String,
    #[serde(default)]
    items: Vec<LineItemDraft>,
}

/// Form state for writing a bid proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct BidComposer {
    items: Vec<LineItemDraft>,
    pub notes: String,
    pub credentials: String,
    pub relevant_experience: String,
}

impl Default for BidComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl BidComposer {
    /// A fresh form starts with one blank line item.
    pub fn new() -> Self {
        Self {
            items: vec![LineItemDraft::default()],
            notes: String::new(),
            credentials: String::new(),
            relevant_experience: String::new(),
        }
    }

    /// Prefill from a stored bid, typically a draft being edited.
    pub fn from_bid(bid: &BidDto) -> Self {
        let mut items: Vec<LineItemDraft> = bid
            .items
            .iter()
            .map(|i| LineItemDraft {
                name: i.name.clone(),
                description: i.description.clone().unwrap_or_default(),
                price: i.price.to_string(),
            })
            .collect();
        if items.is_empty() {
            items.push(LineItemDraft::default());
        }
        Self {
            items,
            notes: bid.notes.clone().unwrap_or_default(),
            credentials: bid.credentials.clone().unwrap_or_default(),
            relevant_experience: bid.relevant_experience.clone().unwrap_or_default(),
        }
    }

    pub fn from_draft_toml(text: &str) -> Result<Self, ClientError> {
        let draft: DraftFile = toml::from_str(text)
            .map_err(|e| ClientError::Invalid(format!("invalid bid draft: {e}")))?;
        let mut composer = Self {
            items: draft.items,
            notes: draft.notes,
            credentials: draft.credentials,
            relevant_experience: draft.relevant_experience,
        };
        if composer.items.is_empty() {
            composer.items.push(LineItemDraft::default());
        }
        Ok(composer)
    }

    pub fn from_draft_file(path: &Path) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_draft_toml(&text)
    }

    pub fn items(&self) -> &[LineItemDraft] {
        &self.items
    }

    /// Append a blank item and return its index.
    pub fn add_item(&mut self) -> usize {
        self.items.push(LineItemDraft::default());
        self.items.len() - 1
    }

    pub fn push_item(&mut self, item: LineItemDraft) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    /// Remove the item at `index`. The last remaining item cannot be removed.
    pub fn remove_item(&mut self, index: usize) -> bool {
        if self.items.len() <= 1 || index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        true
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut LineItemDraft> {
        self.items.get_mut(index)
    }

    /// Sum of the prices as currently typed; anything unparseable counts as zero.
    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .filter_map(|i| parse_price(&i.price))
            .sum()
    }

    pub fn normalize(&self) -> NormalizedBid {
        NormalizedBid {
            items: self
                .items
                .iter()
                .map(|i| NormalizedItem {
                    name: i.name.trim().to_string(),
                    description: non_empty(&i.description),
                    price: parse_price(&i.price),
                })
                .collect(),
            notes: non_empty(&self.notes),
            credentials: non_empty(&self.credentials),
            relevant_experience: non_empty(&self.relevant_experience),
        }
    }

    /// Normalize and validate, producing the create payload.
    pub fn prepare(&self, project: &ProjectId) -> Result<NewBid, String> {
        let bid = self.normalize();
        validation::validate(&bid)?;
        Ok(NewBid {
            project_id: project.clone(),
            items: bid.line_items(),
            total_amount: bid.total(),
            notes: bid.notes,
            credentials: bid.credentials,
            relevant_experience: bid.relevant_experience,
        })
    }

    /// Normalized items for an edit of an existing draft.
    pub fn prepare_items(&self) -> Result<Vec<BidItem>, String> {
        let bid = self.normalize();
        let mut issues = validation::Issues::default();
        validation::check_items(&bid, &mut issues);
        issues.into_result()?;
        Ok(bid.line_items())
    }

    /// Create the draft, then finalize it. A failure between the two steps
    /// leaves the draft on the server and is reported with its id.
    pub async fn submit(
        &self,
        bids: &dyn BidService,
        project: &ProjectId,
    ) -> Result<BidDto, SubmitError> {
        let new_bid = self.prepare(project).map_err(SubmitError::Invalid)?;
        let draft = bids
            .create_bid(&new_bid)
            .await
            .map_err(SubmitError::CreateFailed)?;
        log::info!("created draft bid {} for project {}", draft.id, project);
        match bids.finalize_bid_submission(&draft.id).await {
            Ok(submitted) => Ok(submitted),
            Err(source) => {
                log::warn!("bid {} left in draft: {}", draft.id, source);
                Err(SubmitError::FinalizeFailed {
                    bid_id: draft.id,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::models::{BidId, BidStatus};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct MockBids {
        pub calls: Mutex<Vec<String>>,
        pub created: Mutex<Vec<NewBid>>,
        pub stored: Mutex<Vec<BidDto>>,
        pub fail_create: AtomicBool,
        pub fail_finalize: AtomicBool,
    }

    pub fn bid(id: &str, status: BidStatus) -> BidDto {
        BidDto {
            id: BidId::new(id),
            project_id: ProjectId::new("p1"),
            project_title: Some("Clinic remodel".into()),
            status,
            items: vec![BidItem {
                name: "Framing".into(),
                description: None,
                price: 1000.0,
            }],
            total_amount: Some(1000.0),
            notes: None,
            credentials: None,
            relevant_experience: None,
            created_at: None,
            updated_at: None,
        }
    }

    impl MockBids {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn with_status(&self, id: &BidId, status: BidStatus) -> BidDto {
            let mut b = bid(id.as_str(), status);
            if let Some(existing) = self.stored.lock().unwrap().iter().find(|b| &b.id == id) {
                b.items = existing.items.clone();
            }
            b
        }
    }

    #[async_trait]
    impl BidService for MockBids {
        async fn get_my_bids(&self) -> Result<Vec<BidDto>> {
            self.record("get_my_bids".into());
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn get_bid_detail(&self, id: &BidId) -> Result<BidDto> {
            self.record(format!("detail {id}"));
            self.stored
                .lock()
                .unwrap()
                .iter()
                .find(|b| &b.id == id)
                .cloned()
                .ok_or(ClientError::Api {
                    status: 404,
                    message: "Bid not found".into(),
                })
        }

        async fn create_bid(&self, new_bid: &NewBid) -> Result<BidDto> {
            self.record("create".into());
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 422,
                    message: "Project is closed".into(),
                });
            }
            self.created.lock().unwrap().push(new_bid.clone());
            Ok(bid("new-1", BidStatus::Draft))
        }

        async fn update_bid_items(&self, id: &BidId, items: &[BidItem]) -> Result<BidDto> {
            self.record(format!("update {id}"));
            let mut b = bid(id.as_str(), BidStatus::Draft);
            b.items = items.to_vec();
            b.total_amount = None;
            Ok(b)
        }

        async fn finalize_bid_submission(&self, id: &BidId) -> Result<BidDto> {
            self.record(format!("finalize {id}"));
            if self.fail_finalize.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 503,
                    message: "try later".into(),
                });
            }
            Ok(self.with_status(id, BidStatus::Submitted))
        }

        async fn withdraw_bid(&self, id: &BidId) -> Result<BidDto> {
            self.record(format!("withdraw {id}"));
            Ok(self.with_status(id, BidStatus::Withdrawn))
        }

        async fn delete_bid(&self, id: &BidId) -> Result<()> {
            self.record(format!("delete {id}"));
            let finalized = self
                .stored
                .lock()
                .unwrap()
                .iter()
                .any(|b| &b.id == id && b.status != BidStatus::Draft);
            if finalized {
                return Err(ClientError::Api {
                    status: 409,
                    message: "Only draft bids can be deleted".into(),
                });
            }
            Ok(())
        }
    }

    fn filled() -> BidComposer {
        let mut c = BidComposer::new();
        *c.item_mut(0).unwrap() = LineItemDraft::new(" Demolition ", "1,500");
        c.push_item(LineItemDraft::new("Haul-off", "$250.50"));
        c.notes = "  Crew of four  ".into();
        c
    }

    #[test]
    fn total_tracks_items() {
        let mut c = BidComposer::new();
        assert_eq!(c.total(), 0.0);
        c.item_mut(0).unwrap().price = "100".into();
        let idx = c.add_item();
        c.item_mut(idx).unwrap().price = "50.25".into();
        c.push_item(LineItemDraft::new("Permit", "abc"));
        assert_eq!(c.total(), 150.25);

        assert!(c.remove_item(2));
        assert!(c.remove_item(1));
        assert_eq!(c.total(), 100.0);
        assert!(!c.remove_item(0));
        assert_eq!(c.items().len(), 1);
    }

    #[test]
    fn normalize_trims_and_drops_empty_fields() {
        let n = filled().normalize();
        assert_eq!(n.items[0].name, "Demolition");
        assert_eq!(n.items[0].description, None);
        assert_eq!(n.items[0].price, Some(1500.0));
        assert_eq!(n.items[1].price, Some(250.5));
        assert_eq!(n.notes.as_deref(), Some("Crew of four"));
        assert_eq!(n.credentials, None);
    }

    #[test]
    fn parse_price_handles_blank_and_garbage() {
        assert_eq!(parse_price(""), Some(0.0));
        assert_eq!(parse_price(" $1,000 "), Some(1000.0));
        assert_eq!(parse_price("ten"), None);
        assert_eq!(parse_price("inf"), None);
    }

    #[test]
    fn draft_file_accepts_numeric_prices() {
        let c = BidComposer::from_draft_toml(
            r##"
            notes = "Available from May"

            [[items]]
            name = "Concrete"
            price = 4200

            [[items]]
            name = "Rebar"
            description = "#4 bars"
            price = "310.75"
            "##,
        )
        .unwrap();
        assert_eq!(c.items().len(), 2);
        assert_eq!(c.total(), 4510.75);
        assert_eq!(c.notes, "Available from May");
    }

    #[test]
    fn from_bid_prefills_editable_form() {
        let c = BidComposer::from_bid(&bid("b1", BidStatus::Draft));
        assert_eq!(c.items()[0].name, "Framing");
        assert_eq!(c.total(), 1000.0);
    }

    #[tokio::test]
    async fn empty_names_block_submission_without_calls() {
        let service = MockBids::default();
        let mut c = BidComposer::new();
        c.item_mut(0).unwrap().price = "100".into();
        c.push_item(LineItemDraft::new("   ", "20"));

        let err = c.submit(&service, &ProjectId::new("p1")).await.unwrap_err();
        match err {
            SubmitError::Invalid(msg) => assert_eq!(msg, "Item name is required"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_creates_then_finalizes() {
        let service = MockBids::default();
        let submitted = filled().submit(&service, &ProjectId::new("p1")).await.unwrap();
        assert_eq!(submitted.status, BidStatus::Submitted);
        assert_eq!(
            *service.calls.lock().unwrap(),
            vec!["create".to_string(), "finalize new-1".to_string()]
        );
        let created = service.created.lock().unwrap();
        assert_eq!(created[0].total_amount, 1750.5);
        assert_eq!(created[0].items[0].name, "Demolition");
    }

    #[tokio::test]
    async fn create_failure_stops_before_finalize() {
        let service = MockBids::default();
        service.fail_create.store(true, Ordering::SeqCst);
        let err = filled().submit(&service, &ProjectId::new("p1")).await.unwrap_err();
        assert!(matches!(err, SubmitError::CreateFailed(_)));
        assert_eq!(service.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finalize_failure_reports_left_over_draft() {
        let service = MockBids::default();
        service.fail_finalize.store(true, Ordering::SeqCst);
        let err = filled().submit(&service, &ProjectId::new("p1")).await.unwrap_err();
        match err {
            SubmitError::FinalizeFailed { bid_id, .. } => assert_eq!(bid_id, BidId::new("new-1")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
