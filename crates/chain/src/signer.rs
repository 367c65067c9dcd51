//! Server-side signing of envelopes and entries.

use pennyworth_crypto::{sign_hash, SigningKeypair};

use crate::types::{ChainEntry, ChainSignature, Envelope, EntryHash};
use crate::{ChainError, Result};

/// Hash the envelope payload and append a detached signature under the
/// given key id. The computed hash replaces the pending slot.
pub fn sign_envelope(envelope: &mut Envelope, keypair: &SigningKeypair, kid: &str) -> Result<()> {
    let hash = envelope.payload.digest()?;
    let signature = sign_hash(keypair, &hash);
    if signature.is_empty() {
        return Err(ChainError::InvalidSignature);
    }
    envelope.hash = EntryHash::sha256(hash);
    envelope.signatures.push(ChainSignature::ed25519(kid, signature));
    Ok(())
}

/// Append a detached signature over an entry's existing hash.
pub fn sign_entry(entry: &mut ChainEntry, keypair: &SigningKeypair, kid: &str) -> Result<()> {
    if !entry.hash.is_well_formed() {
        return Err(ChainError::InvalidSignature);
    }
    let signature = sign_hash(keypair, &entry.hash.value);
    entry.signatures.push(ChainSignature::ed25519(kid, signature));
    Ok(())
}
