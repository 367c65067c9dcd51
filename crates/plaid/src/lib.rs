//! Pennyworth Plaid
//!
//! Client for the aggregator's transaction-history endpoint. One call
//! per user per run; any non-200 aborts that user for the day and the
//! next scheduled run retries.

use std::time::Duration;

use chrono::NaiveDate;
use pennyworth_core::RawTransaction;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum PlaidError {
    #[error("aggregator request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("aggregator returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("aggregator response was malformed: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, PlaidError>;

/// The window of transaction history to fetch, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub gte: NaiveDate,
    pub lte: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

pub struct PlaidClient {
    base_url: String,
    client_id: String,
    secret: String,
    http: Client,
}

impl PlaidClient {
    pub fn new(base_url: &str, client_id: &str, secret: &str) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            http,
        })
    }

    /// Fetch a user's recent transactions for the given window.
    pub async fn transactions(
        &self,
        access_token: &str,
        range: &DateRange,
    ) -> Result<Vec<RawTransaction>> {
        let mut options = json!({ "gte": range.gte.to_string() });
        if let Some(lte) = range.lte {
            options["lte"] = json!(lte.to_string());
        }
        let options = options.to_string();

        let response = self
            .http
            .post(format!("{}/connect/get", self.base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("secret", self.secret.as_str()),
                ("access_token", access_token),
                ("options", options.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "aggregator rejected history request");
            return Err(PlaidError::Status {
                status: status.as_u16(),
                body: body.chars().take(256).collect(),
            });
        }

        let parsed: TransactionsResponse = response
            .json()
            .await
            .map_err(|e| PlaidError::Malformed(e.to_string()))?;
        debug!(
            count = parsed.transactions.len(),
            gte = %range.gte,
            "fetched transaction history"
        );
        Ok(parsed.transactions)
    }
}
