//! One claim-process-finalize cycle per trigger.
//!
//! Events are handled strictly one at a time. Per-event failures become
//! status transitions; only store failures abort the run. An aborted run hands
//! its unfinished claims back; if that fails too, their leases expire instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::retry::{self, RetryDecision};
use tracing::{debug, error, info, warn};

use crate::config::OutboxConfig;
use crate::dispatch::{DispatchError, DispatchOutcome, Dispatcher};
use crate::entity::outbox_event;
use crate::outbox::{OutboxStore, StoreError, Transition};

/// What one invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Events finalized as completed, in processing order.
    pub processed_ids: Vec<i64>,
    /// Events that failed and were requeued with backoff.
    pub failed_ids: Vec<i64>,
    /// Events that failed at the attempt ceiling.
    pub dead_lettered_ids: Vec<i64>,
    /// Claimable events left after the run.
    pub remaining: u64,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.processed_ids.len()
    }

    pub fn errors(&self) -> usize {
        self.failed_ids.len() + self.dead_lettered_ids.len()
    }
}

/// The store failed mid-run. Everything in `partial` is already committed.
#[derive(Debug, thiserror::Error)]
#[error("outbox run aborted: {source}")]
pub struct BatchError {
    pub partial: BatchReport,
    #[source]
    pub source: StoreError,
}

pub struct BatchProcessor {
    store: Arc<dyn OutboxStore>,
    dispatcher: Arc<dyn Dispatcher>,
    config: OutboxConfig,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        dispatcher: Arc<dyn Dispatcher>,
        config: OutboxConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    pub async fn run(&self) -> Result<BatchReport, BatchError> {
        self.run_at(Utc::now()).await
    }

    /// Run one invocation as if the wall clock read `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport::default();

        if let Err(source) = self.drain(now, &mut report).await {
            error!(
                error = %source,
                processed = report.processed(),
                errors = report.errors(),
                "Outbox run aborted by store failure"
            );
            return Err(BatchError {
                partial: report,
                source,
            });
        }

        match self.store.count_due(now).await {
            Ok(remaining) => report.remaining = remaining,
            Err(source) => {
                return Err(BatchError {
                    partial: report,
                    source,
                });
            }
        }

        info!(
            processed = report.processed(),
            errors = report.errors(),
            remaining = report.remaining,
            "Outbox run finished"
        );
        Ok(report)
    }

    async fn drain(&self, now: DateTime<Utc>, report: &mut BatchReport) -> Result<(), StoreError> {
        let cap = self.config.max_events_per_run;
        let mut handled: u64 = 0;

        while handled < cap {
            let limit = self.config.batch_size.min(cap - handled);
            let batch = self.store.claim_batch(now, limit).await?;
            if batch.is_empty() {
                break;
            }
            debug!(claimed = batch.len(), "Claimed outbox batch");

            let mut batch = batch.into_iter();
            while let Some(event) = batch.next() {
                handled += 1;
                let id = event.id;
                if let Err(err) = self.process_one(event, now, report).await {
                    let unfinished: Vec<i64> =
                        std::iter::once(id).chain(batch.map(|e| e.id)).collect();
                    self.release(&unfinished).await;
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Best effort: the store just failed, so this may fail as well.
    async fn release(&self, ids: &[i64]) {
        match self.store.release(ids).await {
            Ok(released) => warn!(
                released,
                unfinished = ids.len(),
                "Released unfinished claims back to pending"
            ),
            Err(err) => warn!(
                error = %err,
                unfinished = ids.len(),
                "Could not release unfinished claims, leaving them to lease expiry"
            ),
        }
    }

    async fn process_one(
        &self,
        event: outbox_event::Model,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        if self.store.mark_processing(event.id, now).await? == Transition::Stale {
            debug!(event_id = event.id, "Event finalized elsewhere, skipping");
            return Ok(());
        }

        let timeout = Duration::from_secs(self.config.handler_timeout_secs);
        let result = match tokio::time::timeout(timeout, self.dispatcher.dispatch(&event)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(timeout)),
        };

        match result {
            Ok(outcome) => {
                if self.store.mark_completed(event.id, now).await? == Transition::Applied {
                    report.processed_ids.push(event.id);
                }
                match outcome {
                    DispatchOutcome::Delivered { deliveries } => info!(
                        event_id = event.id,
                        event_type = %event.event_type,
                        deliveries,
                        "Event delivered"
                    ),
                    DispatchOutcome::Skipped(reason) => info!(
                        event_id = event.id,
                        event_type = %event.event_type,
                        reason = %reason,
                        "Event skipped"
                    ),
                    DispatchOutcome::Acknowledged => debug!(
                        event_id = event.id,
                        event_type = %event.event_type,
                        "Event acknowledged"
                    ),
                }
            }
            Err(err) => self.record_failure(&event, &err, now, report).await?,
        }

        Ok(())
    }

    async fn record_failure(
        &self,
        event: &outbox_event::Model,
        err: &DispatchError,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) -> Result<(), StoreError> {
        let message = err.to_string();

        match retry::decide(event.attempts, event.max_attempts) {
            RetryDecision::Retry { attempt, delay } => {
                let transition = self.store.mark_retry(event.id, now + delay, &message).await?;
                if transition == Transition::Applied {
                    report.failed_ids.push(event.id);
                }
                warn!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    attempt,
                    delay_secs = delay.num_seconds(),
                    error = %message,
                    "Delivery failed, retry scheduled"
                );
            }
            RetryDecision::Exhausted { attempt } => {
                let transition = self.store.mark_dead_letter(event.id, &message).await?;
                if transition == Transition::Applied {
                    report.dead_lettered_ids.push(event.id);
                }
                error!(
                    event_id = event.id,
                    event_type = %event.event_type,
                    attempt,
                    error = %message,
                    "Delivery failed at attempt ceiling, moved to dead letter"
                );
            }
        }

        Ok(())
    }
}
