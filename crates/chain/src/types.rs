//! Wire types for chain entries and signer envelopes.
//!
//! These shapes are hashed and signed, so field names are fixed by the
//! wire format. Hashes always cover the canonical JSON of `payload`.

use chrono::Utc;
use pennyworth_core::Money;
use pennyworth_crypto::hash_canonical;
use serde::{Deserialize, Serialize};

use crate::Result;

pub const HASH_SHA256: &str = "sha256";
pub const ALG_ED25519: &str = "ed25519";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryHash {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl EntryHash {
    pub fn sha256(value: String) -> Self {
        Self {
            kind: HASH_SHA256.to_string(),
            value,
        }
    }

    /// A hash slot that has not been computed yet.
    pub fn pending() -> Self {
        Self::sha256(String::new())
    }

    pub fn is_well_formed(&self) -> bool {
        self.kind == HASH_SHA256
            && self.value.len() == 64
            && self.value.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureHeader {
    pub alg: String,
    pub kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainSignature {
    pub header: SignatureHeader,
    pub signature: String,
}

impl ChainSignature {
    pub fn ed25519(kid: &str, signature: String) -> Self {
        Self {
            header: SignatureHeader {
                alg: ALG_ED25519.to_string(),
                kid: kid.to_string(),
            },
            signature,
        }
    }
}

/// The hashed body of one chain entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainPayload {
    pub count: u64,
    pub address: String,
    pub amount: Money,
    pub roundup: Money,
    pub balance: Money,
    pub currency: String,
    pub limit: Money,
    pub previous: Option<String>,
    pub timestamp: String,
    pub reference: String,
}

/// One link of the chain: payload, its hash, and any signatures
/// collected so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainEntry {
    pub hash: EntryHash,
    pub payload: ChainPayload,
    pub signatures: Vec<ChainSignature>,
}

/// What the co-signer receives: the previous tip by value plus the new
/// batch, under its own hash and signature set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvelopePayload {
    pub address: String,
    pub previous: ChainEntry,
    pub transactions: Vec<ChainEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub hash: EntryHash,
    pub payload: EnvelopePayload,
    pub signatures: Vec<ChainSignature>,
}

impl EnvelopePayload {
    /// The envelope digest covers the signature-free projection of the
    /// payload, so the co-signer can attach entry signatures without
    /// invalidating hashes already signed. Both parties sign this one
    /// value.
    pub fn digest(&self) -> Result<String> {
        #[derive(Serialize)]
        struct EntryContent<'a> {
            hash: &'a EntryHash,
            payload: &'a ChainPayload,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            address: &'a str,
            previous: EntryContent<'a>,
            transactions: Vec<EntryContent<'a>>,
        }

        let content = Content {
            address: &self.address,
            previous: EntryContent {
                hash: &self.previous.hash,
                payload: &self.previous.payload,
            },
            transactions: self
                .transactions
                .iter()
                .map(|entry| EntryContent {
                    hash: &entry.hash,
                    payload: &entry.payload,
                })
                .collect(),
        };
        Ok(hash_canonical(&content)?)
    }
}

impl Envelope {
    pub fn new(address: &str, previous: ChainEntry, transactions: Vec<ChainEntry>) -> Self {
        Self {
            hash: EntryHash::pending(),
            payload: EnvelopePayload {
                address: address.to_string(),
                previous,
                transactions,
            },
            signatures: Vec::new(),
        }
    }
}

/// The first entry of an address's chain: count 0, zero balance, no
/// predecessor. Written when the address is provisioned.
pub fn genesis_entry(address: &str, currency: &str, limit: Money) -> Result<ChainEntry> {
    let payload = ChainPayload {
        count: 0,
        address: address.to_string(),
        amount: Money::ZERO,
        roundup: Money::ZERO,
        balance: Money::ZERO,
        currency: currency.to_string(),
        limit,
        previous: None,
        timestamp: Utc::now().to_rfc3339(),
        reference: String::new(),
    };
    let hash = hash_canonical(&payload)?;
    Ok(ChainEntry {
        hash: EntryHash::sha256(hash),
        payload,
        signatures: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_hash_matches_payload() {
        let entry = genesis_entry("addr-1", "USD", Money::from_cents(-1000)).unwrap();
        assert_eq!(entry.payload.count, 0);
        assert_eq!(entry.payload.previous, None);
        assert_eq!(entry.hash.value, hash_canonical(&entry.payload).unwrap());
        assert!(entry.hash.is_well_formed());
    }

    #[test]
    fn test_hash_well_formedness() {
        assert!(!EntryHash::pending().is_well_formed());
        assert!(!EntryHash {
            kind: "md5".to_string(),
            value: "a".repeat(64),
        }
        .is_well_formed());
        assert!(!EntryHash::sha256("zz".repeat(32)).is_well_formed());
        assert!(EntryHash::sha256("ab".repeat(32)).is_well_formed());
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = genesis_entry("addr-1", "USD", Money::from_cents(-1000)).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["hash"]["type"], "sha256");
        assert_eq!(json["payload"]["previous"], serde_json::Value::Null);
        assert_eq!(json["payload"]["balance"], 0);
        assert_eq!(json["payload"]["limit"], -10);
    }

    #[test]
    fn test_envelope_starts_unsigned() {
        let previous = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();
        let envelope = Envelope::new("addr-1", previous, vec![]);
        assert_eq!(envelope.hash.value, "");
        assert_eq!(envelope.hash.kind, "sha256");
        assert!(envelope.signatures.is_empty());
    }

    #[test]
    fn test_digest_ignores_entry_signatures() {
        let mut previous = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();
        let before = Envelope::new("addr-1", previous.clone(), vec![])
            .payload
            .digest()
            .unwrap();

        previous.signatures.push(ChainSignature::ed25519("addr-key", "00".repeat(64)));
        let after = Envelope::new("addr-1", previous, vec![])
            .payload
            .digest()
            .unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_digest_tracks_content() {
        let previous = genesis_entry("addr-1", "USD", Money::ZERO).unwrap();
        let base = Envelope::new("addr-1", previous.clone(), vec![]);
        let renamed = Envelope::new("addr-2", previous, vec![]);
        assert_ne!(
            base.payload.digest().unwrap(),
            renamed.payload.digest().unwrap()
        );
    }
}
