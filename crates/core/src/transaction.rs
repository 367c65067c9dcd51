//! Raw aggregator transactions and the eligibility filter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One card transaction as reported by the aggregator. Unknown fields
/// in the aggregator response are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTransaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub amount: f64,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pending: bool,
}

impl RawTransaction {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let date = self.date.as_deref()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }
}

/// A transaction is eligible for a round-up when it is a settled debit
/// with a well-formed id and date. Positive amounts are debits.
pub fn is_eligible(tx: &RawTransaction) -> bool {
    !tx.pending && tx.amount.is_finite() && tx.amount > 0.0 && !tx.id.is_empty()
        && tx.parsed_date().is_some()
}

/// Keep eligible transactions, preserving input order.
pub fn filter_eligible(transactions: Vec<RawTransaction>) -> Vec<RawTransaction> {
    transactions.into_iter().filter(is_eligible).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, amount: f64, date: Option<&str>, pending: bool) -> RawTransaction {
        RawTransaction {
            id: id.to_string(),
            amount,
            date: date.map(str::to_string),
            name: "Coffee Shop".to_string(),
            pending,
        }
    }

    #[test]
    fn test_keeps_settled_debits() {
        assert!(is_eligible(&tx("t1", 4.20, Some("2023-05-01"), false)));
    }

    #[test]
    fn test_drops_pending() {
        assert!(!is_eligible(&tx("t1", 4.20, Some("2023-05-01"), true)));
    }

    #[test]
    fn test_drops_credits_and_zero() {
        assert!(!is_eligible(&tx("t1", -12.00, Some("2023-05-01"), false)));
        assert!(!is_eligible(&tx("t1", 0.0, Some("2023-05-01"), false)));
    }

    #[test]
    fn test_drops_bad_dates_and_ids() {
        assert!(!is_eligible(&tx("t1", 4.20, None, false)));
        assert!(!is_eligible(&tx("t1", 4.20, Some("05/01/2023"), false)));
        assert!(!is_eligible(&tx("", 4.20, Some("2023-05-01"), false)));
    }

    #[test]
    fn test_drops_non_finite_amounts() {
        assert!(!is_eligible(&tx("t1", f64::NAN, Some("2023-05-01"), false)));
        assert!(!is_eligible(&tx("t1", f64::INFINITY, Some("2023-05-01"), false)));
    }

    #[test]
    fn test_filter_is_stable_and_concats() {
        let first = vec![
            tx("a", 1.10, Some("2023-05-01"), false),
            tx("b", 2.20, Some("2023-05-01"), true),
        ];
        let second = vec![
            tx("c", 3.30, Some("2023-05-02"), false),
            tx("d", -1.00, Some("2023-05-02"), false),
        ];

        let mut concat = first.clone();
        concat.extend(second.clone());

        let mut split = filter_eligible(first);
        split.extend(filter_eligible(second));

        assert_eq!(filter_eligible(concat), split);
        assert_eq!(split.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["a", "c"]);
    }

    #[test]
    fn test_ignores_unknown_aggregator_fields() {
        let json = r#"{
            "_id": "txn-1",
            "amount": 3.5,
            "date": "2023-05-01",
            "name": "Grocer",
            "pending": false,
            "category": ["Food"],
            "account": "acc-9"
        }"#;
        let parsed: RawTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, "txn-1");
        assert!(is_eligible(&parsed));
    }
}
