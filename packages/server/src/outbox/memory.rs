use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{OutboxConfig, OutboxStatus};
use tokio::sync::Mutex;

use crate::entity::outbox_event;

use super::{NewOutboxEvent, OutboxStats, OutboxStore, StoreError, Transition, lease_from};

#[derive(Debug, Default)]
struct MemoryState {
    events: BTreeMap<i64, outbox_event::Model>,
    next_id: i64,
}

/// Outbox kept in process memory.
///
/// Used by tests and local runs without PostgreSQL. Claims happen under a
/// single lock, which gives the same no-double-claim guarantee as the
/// database store.
#[derive(Debug)]
pub struct InMemoryOutboxStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
    lease: Duration,
}

impl Default for InMemoryOutboxStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::default(),
            unavailable: AtomicBool::new(false),
            lease: lease_from(&OutboxConfig::default()),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    fn is_claimable(&self, event: &outbox_event::Model, now: DateTime<Utc>) -> bool {
        if event.attempts >= event.max_attempts {
            return false;
        }
        match event.status {
            OutboxStatus::Pending => event.scheduled_at <= now,
            OutboxStatus::Processing => event
                .processing_started_at
                .is_some_and(|started| started < now - self.lease),
            OutboxStatus::Completed | OutboxStatus::DeadLetter => false,
        }
    }

    /// Insert an event as a producer would, with `created_at = now`.
    pub async fn insert(&self, event: NewOutboxEvent, now: DateTime<Utc>) -> outbox_event::Model {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let model = outbox_event::Model {
            id: state.next_id,
            event_type: event.event_type,
            payload: event.payload,
            status: OutboxStatus::Pending,
            priority: event.priority,
            attempts: 0,
            max_attempts: event.max_attempts,
            scheduled_at: event.scheduled_at.unwrap_or(now),
            processing_started_at: None,
            processed_at: None,
            last_error: None,
            created_at: now,
        };
        state.events.insert(model.id, model.clone());
        model
    }

    pub async fn get(&self, id: i64) -> Option<outbox_event::Model> {
        self.state.lock().await.events.get(&id).cloned()
    }

    pub async fn all(&self) -> Vec<outbox_event::Model> {
        self.state.lock().await.events.values().cloned().collect()
    }

    /// Simulate a store outage: every operation fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store offline".into()))
        } else {
            Ok(())
        }
    }

    /// Move the row to `next` and apply `update`, if the lifecycle allows it.
    async fn transition(
        &self,
        id: i64,
        next: OutboxStatus,
        update: impl FnOnce(&mut outbox_event::Model),
    ) -> Result<Transition, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        match state.events.get_mut(&id) {
            Some(event) if event.status.can_transition_to(next) => {
                event.status = next;
                update(event);
                Ok(Transition::Applied)
            }
            _ => Ok(Transition::Stale),
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: u64,
    ) -> Result<Vec<outbox_event::Model>, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let mut due: Vec<&outbox_event::Model> = state
            .events
            .values()
            .filter(|e| self.is_claimable(e, now))
            .collect();
        due.sort_by_key(|e| (e.priority, e.created_at, e.id));
        let ids: Vec<i64> = due
            .into_iter()
            .take(batch_size as usize)
            .map(|e| e.id)
            .collect();

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(event) = state.events.get_mut(&id) {
                event.status = OutboxStatus::Processing;
                event.processing_started_at = Some(now);
                claimed.push(event.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_processing(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        self.transition(id, OutboxStatus::Processing, |event| {
            event.processing_started_at = Some(now);
        })
        .await
    }

    async fn mark_completed(&self, id: i64, now: DateTime<Utc>) -> Result<Transition, StoreError> {
        self.transition(id, OutboxStatus::Completed, |event| {
            event.processed_at = Some(now);
        })
        .await
    }

    async fn mark_retry(
        &self,
        id: i64,
        next_scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> Result<Transition, StoreError> {
        self.transition(id, OutboxStatus::Pending, |event| {
            event.attempts += 1;
            event.scheduled_at = next_scheduled_at;
            event.last_error = Some(error.to_string());
        })
        .await
    }

    async fn mark_dead_letter(&self, id: i64, error: &str) -> Result<Transition, StoreError> {
        self.transition(id, OutboxStatus::DeadLetter, |event| {
            event.attempts += 1;
            event.last_error = Some(error.to_string());
        })
        .await
    }

    async fn release(&self, ids: &[i64]) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let mut released = 0;
        for id in ids {
            let Some(event) = state.events.get_mut(id) else {
                continue;
            };
            if event.status.can_transition_to(OutboxStatus::Pending) {
                event.status = OutboxStatus::Pending;
                event.processing_started_at = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn count_due(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .events
            .values()
            .filter(|e| self.is_claimable(e, now))
            .count() as u64)
    }

    async fn stats(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
    ) -> Result<OutboxStats, StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let mut stats = OutboxStats::default();

        for event in state.events.values() {
            match event.status {
                OutboxStatus::Pending => stats.pending += 1,
                OutboxStatus::Processing => {
                    stats.processing += 1;
                    if event
                        .processing_started_at
                        .is_some_and(|started| started < stuck_before)
                    {
                        stats.stuck += 1;
                    }
                }
                OutboxStatus::Completed => stats.completed += 1,
                OutboxStatus::DeadLetter => stats.dead_letter += 1,
            }
            if self.is_claimable(event, now) {
                stats.due += 1;
            }
        }

        Ok(stats)
    }

    async fn list_dead_letters(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<outbox_event::Model>, u64), StoreError> {
        self.check_available()?;
        let state = self.state.lock().await;

        let mut dead: Vec<&outbox_event::Model> = state
            .events
            .values()
            .filter(|e| e.status == OutboxStatus::DeadLetter)
            .collect();
        dead.sort_by_key(|e| std::cmp::Reverse((e.created_at, e.id)));

        let total = dead.len() as u64;
        let events = dead
            .into_iter()
            .skip((page.saturating_sub(1) * per_page) as usize)
            .take(per_page as usize)
            .cloned()
            .collect();

        Ok((events, total))
    }
}
