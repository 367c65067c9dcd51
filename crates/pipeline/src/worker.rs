//! Per-user intake worker.
//!
//! One run per user per day: fetch recent history, filter, write audit
//! rows, build the next chain batch on the stored tip, sign, enqueue,
//! and wake the co-signer. Failures abort this user only; the next
//! scheduled run retries the same window.

use std::sync::Arc;

use pennyworth_chain::{build_entries, sign_envelope, Charge, Envelope};
use pennyworth_core::{filter_eligible, Money};
use pennyworth_crypto::{canonical_json, SigningKeypair};
use pennyworth_plaid::DateRange;
use pennyworth_queue::QueueProducer;
use pennyworth_store::{PlaidRecord, Store};
use tracing::{debug, info, warn};

use crate::signer_hook::SignerHook;
use crate::source::TransactionSource;
use crate::{PipelineError, Result};

/// Everything a worker needs for one user, resolved by the scheduler.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub user_id: String,
    pub address: String,
    pub access_token: String,
    pub monthly_limit: Money,
    pub range: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// A signed envelope with this many entries is on the to-signer
    /// queue.
    Enqueued { transactions: usize },
    /// Nothing eligible in the window; nothing was enqueued.
    NothingToDo,
}

pub struct Worker {
    store: Arc<Store>,
    source: Arc<dyn TransactionSource>,
    producer: Arc<dyn QueueProducer>,
    to_signer_queue: String,
    server_key: SigningKeypair,
    server_kid: String,
    hook: Option<SignerHook>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        source: Arc<dyn TransactionSource>,
        producer: Arc<dyn QueueProducer>,
        to_signer_queue: &str,
        server_key: SigningKeypair,
        server_kid: &str,
        hook: Option<SignerHook>,
    ) -> Self {
        Self {
            store,
            source,
            producer,
            to_signer_queue: to_signer_queue.to_string(),
            server_key,
            server_kid: server_kid.to_string(),
            hook,
        }
    }

    pub async fn run(&self, item: &WorkItem) -> Result<WorkOutcome> {
        let raw = self
            .source
            .recent_transactions(&item.access_token, &item.range)
            .await?;
        let eligible = filter_eligible(raw);
        if eligible.is_empty() {
            debug!(user = %item.user_id, "no eligible transactions in window");
            return Ok(WorkOutcome::NothingToDo);
        }

        let mut charges = Vec::with_capacity(eligible.len());
        for tx in &eligible {
            let amount = Money::from_f64(tx.amount)
                .map_err(|_| PipelineError::InvalidAmount(tx.id.clone()))?;
            let roundup = amount.roundup();

            // Audit row first; losing one is logged, not fatal.
            let record = PlaidRecord {
                transaction_id: tx.id.clone(),
                user_id: item.user_id.clone(),
                amount,
                roundup,
                date: tx.date.clone(),
                name: tx.name.clone(),
                summed: false,
            };
            if let Err(error) = self.store.insert_plaid_record(&record) {
                warn!(
                    user = %item.user_id,
                    transaction = %tx.id,
                    error = %error,
                    "audit record not written"
                );
            }

            charges.push(Charge {
                reference: tx.id.clone(),
                amount,
                roundup,
                date: tx.parsed_date(),
            });
        }

        let address = self
            .store
            .get_address(&item.address)?
            .ok_or_else(|| PipelineError::AddressNotFound(item.address.clone()))?;
        let tip_hash = address
            .latest_transaction
            .ok_or_else(|| PipelineError::NoPreviousChain(item.address.clone()))?;
        let previous = self
            .store
            .get_entry(&tip_hash)?
            .ok_or_else(|| PipelineError::NoPreviousChain(item.address.clone()))?;

        let entries = build_entries(&item.address, &previous, &charges)?;
        let Some(last) = entries.last() else {
            return Ok(WorkOutcome::NothingToDo);
        };
        if last.payload.balance < item.monthly_limit {
            warn!(
                user = %item.user_id,
                address = %item.address,
                balance = %last.payload.balance,
                limit = %item.monthly_limit,
                "batch overshoots the pledge limit"
            );
        }

        let count = entries.len();
        let mut envelope = Envelope::new(&item.address, previous, entries);
        sign_envelope(&mut envelope, &self.server_key, &self.server_kid)?;

        let body = canonical_json(&envelope)?;
        self.producer.send(&self.to_signer_queue, &body).await?;

        if let Some(hook) = &self.hook {
            hook.trigger().await?;
        }

        info!(
            user = %item.user_id,
            address = %item.address,
            transactions = count,
            "round-up batch enqueued for co-signing"
        );
        Ok(WorkOutcome::Enqueued { transactions: count })
    }
}
