//! Pennyworth Pipeline
//!
//! The daily round-up run. The scheduler fans eligible users out to
//! intake workers under a fixed concurrency cap; each worker fetches
//! history, builds and signs a chain batch, and enqueues it for the
//! co-signer. The consumer drains the co-signed queue, verifies both
//! signatures, and commits entries to the store.

pub mod consumer;
pub mod scheduler;
pub mod signer_hook;
pub mod source;
pub mod worker;


pub use consumer::{Consumer, DrainSummary};
pub use scheduler::{RunSummary, Scheduler, MAX_CONCURRENT_WORKERS, PROCESS_ROUNDUP};
pub use signer_hook::SignerHook;
pub use source::{StaticSource, TransactionSource};
pub use worker::{WorkItem, WorkOutcome, Worker};

use pennyworth_chain::ChainError;
use pennyworth_crypto::CryptoError;
use pennyworth_plaid::PlaidError;
use pennyworth_queue::QueueError;
use pennyworth_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("address {0} has no previous chain entry")]
    NoPreviousChain(String),
    #[error("address {0} is not provisioned")]
    AddressNotFound(String),
    #[error("transaction {0} has an unusable amount")]
    InvalidAmount(String),
    #[error("queue message is not a transaction chain: {0}")]
    NoTransactionChain(String),
    #[error("envelope signature does not verify against the server key")]
    EnvelopeSignature,
    #[error("latest entry signature does not verify against the address key")]
    LatestEntrySignature,
    #[error("envelope builds on tip {carried} but the address is at {current:?}")]
    StaleEnvelope {
        carried: String,
        current: Option<String>,
    },
    #[error("signer hook failed: {0}")]
    SignerHook(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Plaid(#[from] PlaidError),
}

impl PipelineError {
    /// A stale envelope can never become valid; the consumer deletes
    /// it instead of waiting for redelivery.
    pub fn is_stale(&self) -> bool {
        matches!(self, PipelineError::StaleEnvelope { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
