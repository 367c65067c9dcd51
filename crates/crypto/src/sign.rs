//! Detached signatures over canonical hashes.
//!
//! The signed message is the ASCII bytes of the lowercase hex digest,
//! exactly as it appears in `hash.value` on the wire.

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};

use crate::keys::SigningKeypair;

/// Sign a hex hash string, returning the hex-encoded signature.
pub fn sign_hash(keypair: &SigningKeypair, hash_hex: &str) -> String {
    let signature: Signature = keypair.signing_key.sign(hash_hex.as_bytes());
    hex::encode(signature.to_bytes())
}

/// Verify a hex signature over a hex hash string with a hex public key.
/// Returns false on any malformed input; never panics.
pub fn verify_hash(public_key_hex: &str, hash_hex: &str, signature_hex: &str) -> bool {
    let key_bytes = match hex::decode(public_key_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let key_bytes: [u8; 32] = match key_bytes.as_slice().try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(vk) => vk,
        Err(_) => return false,
    };

    let sig_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let sig_bytes: [u8; 64] = match sig_bytes.as_slice().try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key.verify(hash_hex.as_bytes(), &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::sha256_hex;

    #[test]
    fn test_sign_and_verify() {
        let keypair = SigningKeypair::generate();
        let hash = sha256_hex(b"payload");

        let signature = sign_hash(&keypair, &hash);
        assert!(verify_hash(&keypair.public_key_hex(), &hash, &signature));
        assert!(!verify_hash(
            &keypair.public_key_hex(),
            &sha256_hex(b"other payload"),
            &signature
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair = SigningKeypair::generate();
        let other = SigningKeypair::generate();
        let hash = sha256_hex(b"payload");

        let signature = sign_hash(&keypair, &hash);
        assert!(!verify_hash(&other.public_key_hex(), &hash, &signature));
    }

    #[test]
    fn test_malformed_inputs_are_false() {
        let keypair = SigningKeypair::generate();
        let hash = sha256_hex(b"payload");
        let signature = sign_hash(&keypair, &hash);

        assert!(!verify_hash("zz", &hash, &signature));
        assert!(!verify_hash("abcd", &hash, &signature));
        assert!(!verify_hash(&keypair.public_key_hex(), &hash, "zz"));
        assert!(!verify_hash(&keypair.public_key_hex(), &hash, "abcd"));
    }
}
