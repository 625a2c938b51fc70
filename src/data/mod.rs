//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Store traits consumed by the sync engine

mod database;
mod models;
mod store;

pub use database::Database;
pub use models::*;
pub use store::{AccountStore, ContentStore};

#[cfg(test)]
pub use store::{MockAccountStore, MockContentStore};

#[cfg(test)]
mod database_test;
