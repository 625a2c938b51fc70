//! Authentication
//!
//! Handles:
//! - Identity headers forwarded by the reverse proxy
//! - X/Twitter OAuth 2.0 with PKCE
//! - Pending authorization state

mod middleware;
mod oauth;
pub mod pkce;
mod state;

pub use middleware::{AdminUser, CurrentUser, ProxyIdentity};
pub use oauth::{OAuthHandler, TokenResponse};
pub use state::{OAuthStateStore, PendingAuthorization};
