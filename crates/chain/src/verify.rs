//! Signature verification for envelopes and entries.
//!
//! Verification recomputes the digest before checking any signature,
//! so a payload that drifted from its hash fails closed. These
//! functions return false on malformed input; they never panic.

use pennyworth_crypto::{hash_canonical, verify_hash};

use crate::types::{ChainEntry, Envelope};

/// Verify the last signature on an envelope against its recomputed
/// payload digest.
pub fn verify_envelope(envelope: &Envelope, public_key_hex: &str) -> bool {
    let Some(sig) = envelope.signatures.last() else {
        return false;
    };
    verify_envelope_signature(envelope, public_key_hex, &sig.signature)
}

/// Verify the most recent envelope signature carrying the given key id.
/// A co-signed envelope holds the server signature and the address
/// signature side by side; this picks one by `kid`.
pub fn verify_envelope_kid(envelope: &Envelope, public_key_hex: &str, kid: &str) -> bool {
    let Some(sig) = envelope
        .signatures
        .iter()
        .rev()
        .find(|s| s.header.kid == kid)
    else {
        return false;
    };
    verify_envelope_signature(envelope, public_key_hex, &sig.signature)
}

fn verify_envelope_signature(envelope: &Envelope, public_key_hex: &str, signature: &str) -> bool {
    let digest = match envelope.payload.digest() {
        Ok(digest) => digest,
        Err(_) => return false,
    };
    if digest != envelope.hash.value {
        return false;
    }
    verify_hash(public_key_hex, &digest, signature)
}

/// Verify the last signature on a chain entry against its recomputed
/// payload hash.
pub fn verify_entry(entry: &ChainEntry, public_key_hex: &str) -> bool {
    let hash = match hash_canonical(&entry.payload) {
        Ok(hash) => hash,
        Err(_) => return false,
    };
    if hash != entry.hash.value {
        return false;
    }
    match entry.signatures.last() {
        Some(sig) => verify_hash(public_key_hex, &hash, &sig.signature),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{sign_entry, sign_envelope};
    use crate::types::genesis_entry;
    use pennyworth_core::Money;
    use pennyworth_crypto::SigningKeypair;

    fn signed_envelope(keypair: &SigningKeypair) -> Envelope {
        let previous = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();
        let mut envelope = Envelope::new("addr-1", previous, vec![]);
        sign_envelope(&mut envelope, keypair, "server").unwrap();
        envelope
    }

    #[test]
    fn test_envelope_round_trip() {
        let keypair = SigningKeypair::generate();
        let other = SigningKeypair::generate();
        let envelope = signed_envelope(&keypair);

        assert!(verify_envelope(&envelope, &keypair.public_key_hex()));
        assert!(!verify_envelope(&envelope, &other.public_key_hex()));
    }

    #[test]
    fn test_unsigned_envelope_fails() {
        let keypair = SigningKeypair::generate();
        let previous = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();
        let envelope = Envelope::new("addr-1", previous, vec![]);
        assert!(!verify_envelope(&envelope, &keypair.public_key_hex()));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let keypair = SigningKeypair::generate();
        let mut envelope = signed_envelope(&keypair);
        envelope.payload.address = "addr-2".to_string();
        assert!(!verify_envelope(&envelope, &keypair.public_key_hex()));
    }

    #[test]
    fn test_verify_by_kid_survives_co_signing() {
        let server = SigningKeypair::generate();
        let addr_key = SigningKeypair::generate();
        let mut envelope = signed_envelope(&server);

        // The co-signer stamps each entry and adds its own envelope
        // signature over the unchanged digest.
        for entry in &mut envelope.payload.transactions {
            sign_entry(entry, &addr_key, "addr-key").unwrap();
        }
        let sig = pennyworth_crypto::sign_hash(&addr_key, &envelope.hash.value);
        envelope
            .signatures
            .push(crate::types::ChainSignature::ed25519("addr-key", sig));

        assert!(verify_envelope_kid(&envelope, &server.public_key_hex(), "server"));
        assert!(verify_envelope_kid(&envelope, &addr_key.public_key_hex(), "addr-key"));
        assert!(!verify_envelope_kid(&envelope, &addr_key.public_key_hex(), "server"));
        assert!(!verify_envelope_kid(&envelope, &server.public_key_hex(), "missing-kid"));
        // Last-signature verification now sees the co-signer.
        assert!(verify_envelope(&envelope, &addr_key.public_key_hex()));
    }

    #[test]
    fn test_last_signature_wins() {
        let server = SigningKeypair::generate();
        let addr_key = SigningKeypair::generate();
        let mut entry = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();

        sign_entry(&mut entry, &server, "server").unwrap();
        sign_entry(&mut entry, &addr_key, "addr-key").unwrap();

        assert!(verify_entry(&entry, &addr_key.public_key_hex()));
        assert!(!verify_entry(&entry, &server.public_key_hex()));
    }

    #[test]
    fn test_malformed_key_fails() {
        let keypair = SigningKeypair::generate();
        let mut entry = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();
        sign_entry(&mut entry, &keypair, "server").unwrap();
        assert!(!verify_entry(&entry, "not-a-key"));
    }
}
