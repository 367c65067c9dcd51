//! Consumer for the from-signer queue.
//!
//! Single-flight by design: messages commit one at a time so two
//! envelopes for the same address can never interleave. Three empty
//! long-polls in a row end the run.

use std::sync::Arc;

use chrono::Utc;
use pennyworth_chain::{verify_entry, verify_envelope_kid, Envelope};
use pennyworth_queue::QueueConsumer;
use pennyworth_store::Store;
use tracing::{debug, info, warn};

use crate::scheduler::PROCESS_ROUNDUP;
use crate::{PipelineError, Result};

pub const EMPTY_POLL_LIMIT: u32 = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    /// Envelopes verified and committed.
    pub committed: usize,
    /// Messages dropped: stale, malformed, or failing verification.
    pub dropped: usize,
    /// Long-polls issued, including the terminal empty ones.
    pub polls: u32,
}

pub struct Consumer {
    store: Arc<Store>,
    queue: Arc<dyn QueueConsumer>,
    from_signer_queue: String,
    server_public_key: String,
    server_kid: String,
    empty_poll_limit: u32,
}

impl Consumer {
    pub fn new(
        store: Arc<Store>,
        queue: Arc<dyn QueueConsumer>,
        from_signer_queue: &str,
        server_public_key: &str,
        server_kid: &str,
    ) -> Self {
        Self {
            store,
            queue,
            from_signer_queue: from_signer_queue.to_string(),
            server_public_key: server_public_key.to_string(),
            server_kid: server_kid.to_string(),
            empty_poll_limit: EMPTY_POLL_LIMIT,
        }
    }

    /// Drain the queue until it stays empty. Each message is verified
    /// and committed before its receipt is deleted; a message that
    /// fails verification keeps its receipt so redelivery or the
    /// dead-letter queue picks it up.
    pub async fn run(&self) -> Result<DrainSummary> {
        let mut summary = DrainSummary::default();
        let mut empty_polls = 0u32;

        loop {
            let messages = self.queue.receive(&self.from_signer_queue).await?;
            summary.polls += 1;

            if messages.is_empty() {
                empty_polls += 1;
                if empty_polls >= self.empty_poll_limit {
                    self.store.record_run(PROCESS_ROUNDUP, Utc::now())?;
                    info!(
                        committed = summary.committed,
                        dropped = summary.dropped,
                        "from-signer queue stayed empty; run recorded, operator notified"
                    );
                    return Ok(summary);
                }
                continue;
            }
            empty_polls = 0;

            for message in messages {
                match self.commit(&message.body) {
                    Ok(count) => {
                        if let Err(error) = self
                            .queue
                            .delete(&self.from_signer_queue, &message.receipt_handle)
                            .await
                        {
                            warn!(error = %error, "commit succeeded but delete failed");
                        }
                        summary.committed += 1;
                        debug!(transactions = count, "envelope committed");
                    }
                    Err(error) if error.is_stale() => {
                        warn!(error = %error, "superseded envelope discarded");
                        if let Err(error) = self
                            .queue
                            .delete(&self.from_signer_queue, &message.receipt_handle)
                            .await
                        {
                            warn!(error = %error, "stale envelope delete failed");
                        }
                        summary.dropped += 1;
                    }
                    Err(error) => {
                        warn!(error = %error, "message left for redelivery");
                        summary.dropped += 1;
                    }
                }
            }
        }
    }

    /// Verify one co-signed envelope and commit it: entries first, tip
    /// last, so a crash between the two re-commits idempotently.
    fn commit(&self, body: &str) -> Result<usize> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|e| PipelineError::NoTransactionChain(e.to_string()))?;
        if envelope.payload.transactions.is_empty() {
            return Err(PipelineError::NoTransactionChain(
                "envelope carries no transactions".to_string(),
            ));
        }

        let address = self
            .store
            .get_address(&envelope.payload.address)?
            .ok_or_else(|| PipelineError::AddressNotFound(envelope.payload.address.clone()))?;

        if !verify_envelope_kid(&envelope, &self.server_public_key, &self.server_kid) {
            return Err(PipelineError::EnvelopeSignature);
        }

        // Sequence guard: a batch built on anything but the current tip
        // was superseded by a batch that already committed.
        let carried = &envelope.payload.previous.hash.value;
        if address.latest_transaction.as_deref() != Some(carried.as_str()) {
            return Err(PipelineError::StaleEnvelope {
                carried: carried.clone(),
                current: address.latest_transaction.clone(),
            });
        }

        for entry in &envelope.payload.transactions {
            self.store.upsert_entry(entry)?;
        }

        let expected_count =
            envelope.payload.previous.payload.count + envelope.payload.transactions.len() as u64;
        let latest = envelope
            .payload
            .transactions
            .iter()
            .find(|entry| entry.payload.count == expected_count)
            .ok_or_else(|| {
                PipelineError::NoTransactionChain(format!(
                    "no entry carries the expected count {expected_count}"
                ))
            })?;

        if !verify_entry(latest, &address.public_key) {
            return Err(PipelineError::LatestEntrySignature);
        }

        self.store.advance_tip(
            &address.address,
            address.latest_transaction.as_deref(),
            &latest.hash.value,
        )?;
        Ok(envelope.payload.transactions.len())
    }
}
