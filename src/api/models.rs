use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backend identifiers come as JSON strings or numbers; both end up as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> Result<String, &'static str> {
        match self {
            RawId::Text(s) if s.trim().is_empty() => Err("identifier must not be empty"),
            RawId::Text(s) => Ok(s),
            RawId::Signed(n) => Ok(n.to_string()),
            RawId::Unsigned(n) => Ok(n.to_string()),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer)?
                    .into_string()
                    .map(Self)
                    .map_err(de::Error::custom)
            }
        }
    };
}

string_id!(ConversationId);
string_id!(MessageId);
string_id!(UserId);
string_id!(BidId);
string_id!(ProjectId);

/// Money fields arrive either as numbers or as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

fn parse_amount<E: de::Error>(raw: RawAmount) -> Result<Option<f64>, E> {
    match raw {
        RawAmount::Number(n) if n.is_finite() => Ok(Some(n)),
        RawAmount::Number(_) => Err(E::custom("amount must be finite")),
        RawAmount::Text(s) if s.trim().is_empty() => Ok(None),
        RawAmount::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| E::custom(format!("invalid amount `{s}`"))),
    }
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(parse_amount(RawAmount::deserialize(deserializer)?)?.unwrap_or(0.0))
}

fn de_amount_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<RawAmount>::deserialize(deserializer)? {
        Some(raw) => parse_amount(raw),
        None => Ok(None),
    }
}

/// Accepts `2025-03-01` as well as full RFC 3339 timestamps.
fn de_date_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| de::Error::custom(format!("invalid date `{text}`: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    #[default]
    Direct,
    Group,
    #[serde(alias = "project_linked", alias = "gc_project")]
    Project,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(alias = "id")]
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Participant {
    pub fn display_name(&self) -> String {
        crate::utils::full_name(&self.first_name, &self.last_name)
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDto {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ConversationKind,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub last_message_content: Option<String>,
    #[serde(default)]
    pub last_message_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub related_gc_project_id: Option<ProjectId>,
    #[serde(default)]
    pub related_project_id: Option<ProjectId>,
}

impl ConversationDto {
    pub fn project(&self) -> Option<&ProjectId> {
        self.related_gc_project_id
            .as_ref()
            .or(self.related_project_id.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: MessageId,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub sender_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, alias = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

/// Body of the REST send call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<Attachment>,
    pub client_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Draft,
    Submitted,
    Viewed,
    Accepted,
    Rejected,
    Withdrawn,
}

impl BidStatus {
    /// Line items may only change while the bid is a draft.
    pub fn is_editable(self) -> bool {
        self == BidStatus::Draft
    }

    /// Submitted bids the owner has not yet heard back on.
    pub fn is_pending_review(self) -> bool {
        matches!(self, BidStatus::Submitted | BidStatus::Viewed)
    }

    pub fn is_closed(self) -> bool {
        matches!(
            self,
            BidStatus::Accepted | BidStatus::Rejected | BidStatus::Withdrawn
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BidStatus::Draft => "draft",
            BidStatus::Submitted => "submitted",
            BidStatus::Viewed => "viewed",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
            BidStatus::Withdrawn => "withdrawn",
        }
    }
}

impl std::str::FromStr for BidStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| format!("unknown bid status `{s}`"))
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(deserialize_with = "de_amount")]
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidDto {
    pub id: BidId,
    pub project_id: ProjectId,
    #[serde(default)]
    pub project_title: Option<String>,
    pub status: BidStatus,
    #[serde(default)]
    pub items: Vec<BidItem>,
    #[serde(default, deserialize_with = "de_amount_opt")]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub relevant_experience: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BidDto {
    /// Server total when present, otherwise the sum of line items.
    pub fn total(&self) -> f64 {
        self.total_amount
            .unwrap_or_else(|| self.items.iter().map(|i| i.price).sum())
    }
}

/// Body of the create call; the result is always a draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBid {
    pub project_id: ProjectId,
    pub items: Vec<BidItem>,
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant_experience: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectListing {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "de_amount_opt")]
    pub budget_min: Option<f64>,
    #[serde(default, deserialize_with = "de_amount_opt")]
    pub budget_max: Option<f64>,
    #[serde(default)]
    pub trades: Vec<String>,
    #[serde(default, deserialize_with = "de_date_opt")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub nigp_code: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

impl ProjectListing {
    /// Upper end of the budget, falling back to the lower end.
    pub fn budget_ceiling(&self) -> Option<f64> {
        self.budget_max.or(self.budget_min)
    }

    pub fn budget_floor(&self) -> Option<f64> {
        self.budget_min.or(self.budget_max)
    }
}
