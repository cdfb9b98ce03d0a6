//! Durable outbox storage.
//!
//! The store owns persistence and indexed retrieval only. Every transition is a
//! single-row update keyed by event id, so a crash mid-batch leaves finished rows
//! finished. A claim is a lease: a `processing` row whose claim is older than the
//! lease is claimable again, so an invocation that dies mid-batch never strands
//! its remaining events.

mod memory;
mod service;

pub use memory::InMemoryOutboxStore;
pub use service::{PgOutboxStore, enqueue};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{NotificationEvent, OutboxConfig};
use sea_orm::DbErr;
use serde_json::Value;

use crate::entity::outbox_event;

/// Default priority for producer-inserted events.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Claim lease derived from `stuck_after_secs`: a claim older than this is
/// reported as stuck and may be claimed again.
pub fn lease_from(config: &OutboxConfig) -> Duration {
    Duration::seconds(config.stuck_after_secs.min(u64::from(u32::MAX)) as i64)
}

/// Result of a single-row lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The row was in the expected state and has been updated.
    Applied,
    /// The row was missing or already moved on; nothing changed.
    Stale,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("outbox store unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot of the outbox for operational inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub dead_letter: u64,
    /// Events eligible for claiming right now, expired leases included.
    pub due: u64,
    /// Processing events claimed before the stuck threshold.
    pub stuck: u64,
}

/// An event a producer wants to record.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub event_type: String,
    pub payload: Value,
    pub priority: i32,
    pub max_attempts: i32,
    /// `None` means immediately eligible.
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewOutboxEvent {
    /// Build an event from a typed notification, with the configured attempt ceiling.
    pub fn new(event: &NotificationEvent, config: &OutboxConfig) -> Self {
        Self::raw(event.event_type(), event.payload(), config)
    }

    /// Build an event from an arbitrary tag and payload.
    pub fn raw(event_type: impl Into<String>, payload: Value, config: &OutboxConfig) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            priority: DEFAULT_PRIORITY,
            max_attempts: config.max_attempts,
            scheduled_at: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

/// Persistence contract used by the batch processor.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Claim up to `batch_size` due events, ordered by `(priority, created_at)`.
    ///
    /// Eligible rows have `attempts < max_attempts` and are either `pending`
    /// with `scheduled_at <= now`, or `processing` with a claim older than the
    /// store's lease. Claimed rows are flipped to `processing` atomically, so
    /// two overlapping invocations never hold the same live claim.
    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: u64,
    ) -> Result<Vec<outbox_event::Model>, StoreError>;

    /// Stamp a claimed event as processing, renewing its lease. Idempotent on id.
    async fn mark_processing(&self, id: i64, now: DateTime<Utc>)
    -> Result<Transition, StoreError>;

    /// Terminal success.
    async fn mark_completed(&self, id: i64, now: DateTime<Utc>) -> Result<Transition, StoreError>;

    /// Back to `pending` with one more attempt recorded.
    async fn mark_retry(
        &self,
        id: i64,
        next_scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> Result<Transition, StoreError>;

    /// Terminal failure with one more attempt recorded.
    async fn mark_dead_letter(&self, id: i64, error: &str) -> Result<Transition, StoreError>;

    /// Hand unfinished claims back to `pending` without charging an attempt.
    /// Returns how many rows moved.
    async fn release(&self, ids: &[i64]) -> Result<u64, StoreError>;

    /// Number of events a claim at `now` could still pick up.
    async fn count_due(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn stats(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
    ) -> Result<OutboxStats, StoreError>;

    /// Dead-lettered events, newest first. `page` is 1-based.
    async fn list_dead_letters(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<outbox_event::Model>, u64), StoreError>;
}
