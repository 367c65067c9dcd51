//! Pennyworth Core
//!
//! Shared types for the round-up pipeline: fixed-point money, raw
//! aggregator transactions, and the eligibility filter.

pub mod money;
pub mod transaction;

pub use money::{Money, MoneyError};
pub use transaction::{filter_eligible, is_eligible, RawTransaction};
