use thiserror::Error;

use crate::api::models::{BidId, BidStatus};

/// Errors surfaced by the API client, the socket link and the view-models.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("socket is not connected")]
    SocketClosed,

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bid {id} is {status} and its line items can no longer be edited")]
    BidLocked { id: BidId, status: BidStatus },

    #[error("{0}")]
    Invalid(String),

    #[error("message is empty")]
    EmptyMessage,
}

impl ClientError {
    /// True for failures reported by the backend itself rather than the transport.
    pub fn is_backend_rejection(&self) -> bool {
        matches!(self, ClientError::Api { .. })
    }
}

/// Outcome of a failed two-step bid submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Invalid(String),

    #[error("could not create bid: {0}")]
    CreateFailed(#[source] ClientError),

    #[error("bid {bid_id} was saved as a draft but could not be submitted: {source}")]
    FinalizeFailed {
        bid_id: BidId,
        #[source]
        source: ClientError,
    },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
