//! Chain builder: turns a verified previous tip and a batch of charged
//! transactions into linked, hashed entries.

use chrono::{NaiveDate, Utc};
use pennyworth_core::Money;
use pennyworth_crypto::hash_canonical;

use crate::types::{ChainEntry, ChainPayload, EntryHash};
use crate::{ChainError, Result};

/// One eligible transaction with its round-up already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    pub reference: String,
    pub amount: Money,
    pub roundup: Money,
    pub date: Option<NaiveDate>,
}

impl Charge {
    fn timestamp(&self) -> String {
        match self.date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
            Some(midnight) => midnight.and_utc().to_rfc3339(),
            None => Utc::now().to_rfc3339(),
        }
    }
}

/// Build the next entries for `address` on top of `previous`.
///
/// The previous entry is re-hashed before anything is linked to it;
/// currency and limit carry forward unchanged. Returns one entry per
/// charge, in input order. An empty batch returns an empty vec.
pub fn build_entries(
    address: &str,
    previous: &ChainEntry,
    charges: &[Charge],
) -> Result<Vec<ChainEntry>> {
    if previous.payload.address != address {
        return Err(ChainError::AddressMismatch {
            expected: address.to_string(),
            found: previous.payload.address.clone(),
        });
    }
    if !previous.hash.is_well_formed() || previous.payload.currency.is_empty() {
        return Err(ChainError::InvalidPreviousTransaction);
    }
    if hash_canonical(&previous.payload)? != previous.hash.value {
        return Err(ChainError::PreviousTransactionHashMismatch);
    }

    let mut entries = Vec::with_capacity(charges.len());
    let mut prev_hash = previous.hash.value.clone();
    let mut count = previous.payload.count;
    let mut balance = previous.payload.balance;

    for charge in charges {
        if charge.reference.is_empty() {
            return Err(ChainError::InvalidTransactionInput);
        }
        if !charge.amount.is_positive() {
            return Err(ChainError::InvalidTransactionAmount {
                reference: charge.reference.clone(),
            });
        }
        if charge.roundup.is_negative() {
            return Err(ChainError::InvalidTransactionRoundup {
                reference: charge.reference.clone(),
            });
        }

        count += 1;
        balance = balance - charge.roundup;

        let payload = ChainPayload {
            count,
            address: address.to_string(),
            amount: charge.amount,
            roundup: charge.roundup,
            balance,
            currency: previous.payload.currency.clone(),
            limit: previous.payload.limit,
            previous: Some(prev_hash.clone()),
            timestamp: charge.timestamp(),
            reference: charge.reference.clone(),
        };
        let hash = hash_canonical(&payload)?;
        prev_hash = hash.clone();

        entries.push(ChainEntry {
            hash: EntryHash::sha256(hash),
            payload,
            signatures: Vec::new(),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::genesis_entry;

    const ADDRESS: &str = "wVdC5KrMHzrzUfDDC6BbTLcBYMoyvb4";

    fn charge(reference: &str, amount_cents: i64) -> Charge {
        let amount = Money::from_cents(amount_cents);
        Charge {
            reference: reference.to_string(),
            amount,
            roundup: amount.roundup(),
            date: NaiveDate::from_ymd_opt(2023, 5, 14),
        }
    }

    fn genesis() -> ChainEntry {
        genesis_entry(ADDRESS, "USD", Money::from_cents(-1000)).unwrap()
    }

    #[test]
    fn test_builds_linked_batch() {
        let amounts = [123, 456, 789, 234, 567, 890, 345, 678, 901];
        let expected_roundups = [77, 44, 11, 66, 33, 10, 55, 22, 99];
        let expected_balances = [-77, -121, -132, -198, -231, -241, -296, -318, -417];

        let charges: Vec<Charge> = amounts
            .iter()
            .enumerate()
            .map(|(i, &cents)| charge(&format!("txn-{i}"), cents))
            .collect();

        let previous = genesis();
        let entries = build_entries(ADDRESS, &previous, &charges).unwrap();

        assert_eq!(entries.len(), amounts.len());
        let mut prev_hash = previous.hash.value.clone();
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.payload.count, i as u64 + 1);
            assert_eq!(entry.payload.roundup.cents(), expected_roundups[i]);
            assert_eq!(entry.payload.balance.cents(), expected_balances[i]);
            assert_eq!(entry.payload.previous.as_deref(), Some(prev_hash.as_str()));
            assert_eq!(entry.payload.currency, "USD");
            assert_eq!(entry.payload.limit.cents(), -1000);
            assert_eq!(entry.hash.value, hash_canonical(&entry.payload).unwrap());
            assert!(entry.signatures.is_empty());
            prev_hash = entry.hash.value.clone();
        }
        assert_eq!(entries.last().unwrap().payload.count, 9);
    }

    #[test]
    fn test_balance_sums_roundups() {
        let charges = vec![charge("a", 123), charge("b", 456), charge("c", 250)];
        let previous = genesis();
        let entries = build_entries(ADDRESS, &previous, &charges).unwrap();

        let total: i64 = charges.iter().map(|c| c.roundup.cents()).sum();
        let last = entries.last().unwrap();
        assert_eq!(
            last.payload.balance,
            previous.payload.balance - Money::from_cents(total)
        );
    }

    #[test]
    fn test_empty_batch_is_empty() {
        assert!(build_entries(ADDRESS, &genesis(), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_address_mismatch() {
        let result = build_entries("different-address", &genesis(), &[charge("a", 123)]);
        assert!(matches!(result, Err(ChainError::AddressMismatch { .. })));
    }

    #[test]
    fn test_tampered_previous_hash() {
        let mut previous = genesis();
        let flipped = if previous.hash.value.starts_with('0') { "f" } else { "0" };
        previous.hash.value.replace_range(0..1, flipped);
        let result = build_entries(ADDRESS, &previous, &[charge("a", 123)]);
        assert!(matches!(
            result,
            Err(ChainError::PreviousTransactionHashMismatch)
        ));
    }

    #[test]
    fn test_tampered_previous_payload() {
        let mut previous = genesis();
        previous.payload.balance = Money::from_cents(-1);
        let result = build_entries(ADDRESS, &previous, &[charge("a", 123)]);
        assert!(matches!(
            result,
            Err(ChainError::PreviousTransactionHashMismatch)
        ));
    }

    #[test]
    fn test_malformed_previous() {
        let mut previous = genesis();
        previous.hash = EntryHash::pending();
        let result = build_entries(ADDRESS, &previous, &[charge("a", 123)]);
        assert!(matches!(result, Err(ChainError::InvalidPreviousTransaction)));
    }

    #[test]
    fn test_rejects_bad_charges() {
        let previous = genesis();

        let mut empty_ref = charge("a", 123);
        empty_ref.reference.clear();
        assert!(matches!(
            build_entries(ADDRESS, &previous, &[empty_ref]),
            Err(ChainError::InvalidTransactionInput)
        ));

        let zero_amount = Charge {
            reference: "z".to_string(),
            amount: Money::ZERO,
            roundup: Money::ZERO,
            date: None,
        };
        assert!(matches!(
            build_entries(ADDRESS, &previous, &[zero_amount]),
            Err(ChainError::InvalidTransactionAmount { .. })
        ));

        let negative_roundup = Charge {
            reference: "n".to_string(),
            amount: Money::from_cents(123),
            roundup: Money::from_cents(-1),
            date: None,
        };
        assert!(matches!(
            build_entries(ADDRESS, &previous, &[negative_roundup]),
            Err(ChainError::InvalidTransactionRoundup { .. })
        ));
    }

    #[test]
    fn test_builds_on_non_genesis_tip() {
        let previous = genesis();
        let first = build_entries(ADDRESS, &previous, &[charge("a", 123)]).unwrap();
        let tip = first.last().unwrap();

        let second = build_entries(ADDRESS, tip, &[charge("b", 456)]).unwrap();
        let entry = &second[0];
        assert_eq!(entry.payload.count, 2);
        assert_eq!(entry.payload.previous.as_deref(), Some(tip.hash.value.as_str()));
        assert_eq!(entry.payload.balance.cents(), -121);
    }

    #[test]
    fn test_dated_charges_get_midnight_timestamps() {
        let entries = build_entries(ADDRESS, &genesis(), &[charge("a", 123)]).unwrap();
        assert_eq!(entries[0].payload.timestamp, "2023-05-14T00:00:00+00:00");
    }
}
