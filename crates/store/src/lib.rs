//! Pennyworth Store
//!
//! SQLite persistence for the pipeline. Users keep their pledge and
//! aggregator material as JSON documents; chain entries are keyed by
//! hash and audit records by transaction id, so replays are idempotent.

pub mod models;
pub mod store;

pub use models::{AddressRecord, Bank, PlaidRecord, Pledge, User};
pub use store::Store;

use pennyworth_chain::ChainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored document is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
