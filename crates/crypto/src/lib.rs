//! Pennyworth Crypto
//!
//! Pure cryptographic primitives for the round-up chain: canonical JSON
//! serialization, SHA-256 hashing, and ed25519 detached signatures.
//! No dependency on any pipeline-specific types.

pub mod canon;
pub mod keys;
pub mod sign;

pub use canon::{canonical_json, hash_canonical, sha256_hex};
pub use keys::{KeyError, SigningKeypair};
pub use sign::{sign_hash, verify_hash};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("canonical serialization failed: {0}")]
    Serialization(String),
    #[error("invalid key material: {0}")]
    Key(#[from] KeyError),
}
