//! API layer
//!
//! HTTP handlers for:
//! - The current user and their social accounts
//! - Tracked content (including the admin view)
//! - X/Twitter OAuth
//! - Health and Prometheus metrics

mod accounts;
mod content;
mod dto;
mod oauth;
mod ops;

pub use dto::*;

pub use accounts::accounts_router;
pub use content::content_router;
pub use oauth::oauth_router;
pub use ops::ops_router;
