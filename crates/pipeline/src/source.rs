//! Seam between workers and the aggregator.

use async_trait::async_trait;
use pennyworth_core::RawTransaction;
use pennyworth_plaid::{DateRange, PlaidClient, Result};

#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn recent_transactions(
        &self,
        access_token: &str,
        range: &DateRange,
    ) -> Result<Vec<RawTransaction>>;
}

#[async_trait]
impl TransactionSource for PlaidClient {
    async fn recent_transactions(
        &self,
        access_token: &str,
        range: &DateRange,
    ) -> Result<Vec<RawTransaction>> {
        self.transactions(access_token, range).await
    }
}

/// Serves a fixed transaction list regardless of token or range. Used
/// for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    transactions: Vec<RawTransaction>,
}

impl StaticSource {
    pub fn new(transactions: Vec<RawTransaction>) -> Self {
        Self { transactions }
    }
}

#[async_trait]
impl TransactionSource for StaticSource {
    async fn recent_transactions(
        &self,
        _access_token: &str,
        _range: &DateRange,
    ) -> Result<Vec<RawTransaction>> {
        Ok(self.transactions.clone())
    }
}
