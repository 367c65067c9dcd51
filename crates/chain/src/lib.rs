//! Pennyworth Chain
//!
//! The hash-linked donation chain. Each address owns an append-only
//! sequence of entries; entry *n* names entry *n-1* by hash and carries
//! the running balance. Batches travel to the co-signer inside an
//! envelope holding the previous tip by value.

pub mod builder;
pub mod signer;
pub mod types;
pub mod verify;

pub use builder::{build_entries, Charge};
pub use signer::{sign_entry, sign_envelope};
pub use types::{
    genesis_entry, ChainEntry, ChainPayload, ChainSignature, Envelope, EnvelopePayload,
    EntryHash, SignatureHeader, ALG_ED25519, HASH_SHA256,
};
pub use verify::{verify_entry, verify_envelope, verify_envelope_kid};

use pennyworth_crypto::CryptoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("previous entry belongs to address {found}, expected {expected}")]
    AddressMismatch { expected: String, found: String },
    #[error("previous entry is malformed")]
    InvalidPreviousTransaction,
    #[error("previous entry hash does not match its payload")]
    PreviousTransactionHashMismatch,
    #[error("transaction is missing a reference id")]
    InvalidTransactionInput,
    #[error("transaction {reference} has a non-positive amount")]
    InvalidTransactionAmount { reference: String },
    #[error("transaction {reference} has a negative round-up")]
    InvalidTransactionRoundup { reference: String },
    #[error("signature could not be produced")]
    InvalidSignature,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type Result<T> = std::result::Result<T, ChainError>;
