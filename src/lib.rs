pub mod api;
pub mod app;
pub mod bids;
pub mod chat;
pub mod cli;
pub mod discovery;
pub mod error;
pub mod storage;
pub mod ui;
pub mod utils;

pub use error::{ClientError, Result, SubmitError};
