//! Daily scheduler: pick eligible users, bound the fan-out, and record
//! the run.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use pennyworth_plaid::DateRange;
use pennyworth_store::{Store, User};
use tracing::{debug, info, warn};

use crate::worker::{WorkItem, WorkOutcome, Worker};
use crate::Result;

pub const PROCESS_ROUNDUP: &str = "roundup";
pub const MAX_CONCURRENT_WORKERS: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Users matching the eligibility query.
    pub selected: usize,
    /// Work items handed to workers.
    pub dispatched: usize,
    /// Workers that enqueued a batch.
    pub enqueued: usize,
    /// Workers that found nothing eligible.
    pub idle: usize,
    /// Workers that failed; retried on the next scheduled run.
    pub failed: usize,
    /// Users skipped before dispatch (already ran, missing address or
    /// credentials).
    pub skipped: usize,
}

pub struct Scheduler {
    store: Arc<Store>,
    worker: Arc<Worker>,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, worker: Arc<Worker>) -> Self {
        Self {
            store,
            worker,
            concurrency: MAX_CONCURRENT_WORKERS,
        }
    }

    pub async fn run(
        &self,
        gte_override: Option<NaiveDate>,
        lte_override: Option<NaiveDate>,
    ) -> Result<RunSummary> {
        self.run_for_date(Utc::now().date_naive(), gte_override, lte_override)
            .await
    }

    /// The run body with an explicit "today", so a run started just
    /// before midnight stays on one calendar date.
    pub async fn run_for_date(
        &self,
        today: NaiveDate,
        gte_override: Option<NaiveDate>,
        lte_override: Option<NaiveDate>,
    ) -> Result<RunSummary> {
        let users = self.store.eligible_users()?;
        let mut summary = RunSummary {
            selected: users.len(),
            ..RunSummary::default()
        };

        let mut items = Vec::new();
        for user in &users {
            match self.plan(user, today, gte_override, lte_override)? {
                Some(item) => items.push(item),
                None => summary.skipped += 1,
            }
        }
        summary.dispatched = items.len();

        let mut outcomes = stream::iter(items.into_iter().map(|item| {
            let worker = Arc::clone(&self.worker);
            async move {
                let outcome = worker.run(&item).await;
                (item, outcome)
            }
        }))
        .buffer_unordered(self.concurrency);

        while let Some((item, outcome)) = outcomes.next().await {
            match outcome {
                Ok(WorkOutcome::Enqueued { .. }) => {
                    self.store.set_latest_roundup_date(&item.user_id, today)?;
                    summary.enqueued += 1;
                }
                Ok(WorkOutcome::NothingToDo) => summary.idle += 1,
                Err(error) => {
                    warn!(user = %item.user_id, error = %error, "round-up worker failed");
                    summary.failed += 1;
                }
            }
        }

        self.store.record_run(PROCESS_ROUNDUP, Utc::now())?;
        info!(
            selected = summary.selected,
            dispatched = summary.dispatched,
            enqueued = summary.enqueued,
            idle = summary.idle,
            failed = summary.failed,
            skipped = summary.skipped,
            "round-up run complete"
        );
        Ok(summary)
    }

    fn plan(
        &self,
        user: &User,
        today: NaiveDate,
        gte_override: Option<NaiveDate>,
        lte_override: Option<NaiveDate>,
    ) -> Result<Option<WorkItem>> {
        if user.latest_roundup_date == Some(today) {
            debug!(user = %user.id, "already ran today");
            return Ok(None);
        }
        let Some(pledge) = user.active_pledge() else {
            return Ok(None);
        };

        let month = month_key(today);
        let Some(address) = pledge.addresses.get(&month) else {
            warn!(user = %user.id, month = %month, "pledge has no address for this month");
            return Ok(None);
        };

        let Some(bank_kind) = self.store.bank_kind(&pledge.bank_id)? else {
            warn!(user = %user.id, bank = %pledge.bank_id, "pledge names an unknown bank");
            return Ok(None);
        };
        let Some(token) = user.aggregator_tokens.get(&bank_kind) else {
            warn!(user = %user.id, bank_kind = %bank_kind, "no aggregator token for bank");
            return Ok(None);
        };

        Ok(Some(WorkItem {
            user_id: user.id.clone(),
            address: address.clone(),
            access_token: token.clone(),
            monthly_limit: pledge.monthly_limit,
            range: date_range(user.latest_roundup_date, today, gte_override, lte_override),
        }))
    }
}

fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The history window for one user. Defaults to everything since the
/// last run (or the start of the month); both bounds stay strictly
/// before today so partial days are never rounded up.
fn date_range(
    latest_roundup_date: Option<NaiveDate>,
    today: NaiveDate,
    gte_override: Option<NaiveDate>,
    lte_override: Option<NaiveDate>,
) -> DateRange {
    let yesterday = today.pred_opt().unwrap_or(today);
    let gte = gte_override
        .or(latest_roundup_date)
        .unwrap_or_else(|| first_of_month(today))
        .min(yesterday);
    let lte = lte_override.map(|d| d.min(yesterday));
    DateRange { gte, lte }
}
