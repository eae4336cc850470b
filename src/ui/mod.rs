//! Terminal front-end: each module renders one area of the client.

pub mod bids;
pub mod chat_view;
pub mod login;
pub mod main_window;
pub mod projects;
pub mod sidebar;
