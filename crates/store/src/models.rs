//! Persisted entity shapes.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use pennyworth_core::Money;
use serde::{Deserialize, Serialize};

/// A pledge directs round-ups from one bank to one non-profit, with a
/// ledger address per calendar month ("YYYY-MM" keys).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pledge {
    pub active: bool,
    pub bank_id: String,
    pub npo_id: String,
    pub monthly_limit: Money,
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub active: bool,
    #[serde(default)]
    pub latest_roundup_date: Option<NaiveDate>,
    #[serde(default)]
    pub aggregator_tokens: HashMap<String, String>,
    #[serde(default)]
    pub aggregator_accounts: HashMap<String, String>,
    #[serde(default)]
    pub pledges: Vec<Pledge>,
}

impl User {
    /// The pledge the pipeline works with. Users with several active
    /// pledges get the first one.
    pub fn active_pledge(&self) -> Option<&Pledge> {
        self.pledges.iter().find(|p| p.active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bank {
    pub id: String,
    pub kind: String,
}

/// A ledger address row: the co-signer's public key for that address
/// and the hash of the current chain tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: String,
    pub public_key: String,
    pub latest_transaction: Option<String>,
}

/// Audit copy of one eligible aggregator transaction, written before
/// chain assembly. `summed` stays false until a reconciliation pass
/// picks the row up.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaidRecord {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: Money,
    pub roundup: Money,
    pub date: Option<String>,
    pub name: String,
    pub summed: bool,
}
