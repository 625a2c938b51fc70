//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the platform clients, OAuth handler and stores.

mod sync;
mod tokens;

pub use sync::{SyncResult, SyncService};
pub use tokens::TokenLifecycle;
