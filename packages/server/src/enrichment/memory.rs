use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    DomainReader, ReadError, StatusChange, ThreadChannel, ThreadRegistry, TicketRecord,
    UserRecord,
};

#[derive(Debug, Default)]
struct Directory {
    tickets: HashMap<i32, TicketRecord>,
    users: HashMap<i32, UserRecord>,
    statuses: HashMap<i32, String>,
    categories: HashMap<i32, String>,
    sub_categories: HashMap<i32, String>,
    status_changes: HashMap<i32, Vec<(DateTime<Utc>, StatusChange)>>,
    threads: HashMap<(i32, ThreadChannel, String), String>,
    user_reads: HashMap<i32, usize>,
}

/// Helpdesk directory held in memory, with per-user read counters.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: Mutex<Directory>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_ticket(&self, ticket: TicketRecord) {
        self.inner.lock().await.tickets.insert(ticket.id, ticket);
    }

    pub async fn remove_ticket(&self, id: i32) {
        self.inner.lock().await.tickets.remove(&id);
    }

    pub async fn add_user(&self, user: UserRecord) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    pub async fn add_status(&self, id: i32, label: &str) {
        self.inner.lock().await.statuses.insert(id, label.into());
    }

    pub async fn add_category(&self, id: i32, name: &str) {
        self.inner.lock().await.categories.insert(id, name.into());
    }

    pub async fn add_sub_category(&self, id: i32, name: &str) {
        self.inner.lock().await.sub_categories.insert(id, name.into());
    }

    /// Log a status change on `ticket_id` at time `at`.
    pub async fn add_status_change(&self, ticket_id: i32, at: DateTime<Utc>, change: StatusChange) {
        self.inner
            .lock()
            .await
            .status_changes
            .entry(ticket_id)
            .or_default()
            .push((at, change));
    }

    /// How many times `user(id)` has been called.
    pub async fn user_reads(&self, id: i32) -> usize {
        self.inner
            .lock()
            .await
            .user_reads
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn thread(&self, ticket_id: i32, channel: ThreadChannel, target: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .threads
            .get(&(ticket_id, channel, target.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DomainReader for InMemoryDirectory {
    async fn ticket(&self, id: i32) -> Result<Option<TicketRecord>, ReadError> {
        Ok(self.inner.lock().await.tickets.get(&id).cloned())
    }

    async fn user(&self, id: i32) -> Result<Option<UserRecord>, ReadError> {
        let mut inner = self.inner.lock().await;
        *inner.user_reads.entry(id).or_insert(0) += 1;
        Ok(inner.users.get(&id).cloned())
    }

    async fn status_label(&self, status_id: i32) -> Result<Option<String>, ReadError> {
        Ok(self.inner.lock().await.statuses.get(&status_id).cloned())
    }

    async fn category_name(&self, id: i32) -> Result<Option<String>, ReadError> {
        Ok(self.inner.lock().await.categories.get(&id).cloned())
    }

    async fn sub_category_name(&self, id: i32) -> Result<Option<String>, ReadError> {
        Ok(self.inner.lock().await.sub_categories.get(&id).cloned())
    }

    async fn latest_status_change(
        &self,
        ticket_id: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, ReadError> {
        let inner = self.inner.lock().await;
        let latest = inner
            .status_changes
            .get(&ticket_id)
            .into_iter()
            .flatten()
            .filter(|(at, _)| *at <= as_of)
            .max_by_key(|(at, _)| *at)
            .map(|(_, change)| change.clone());
        Ok(latest)
    }
}

#[async_trait]
impl ThreadRegistry for InMemoryDirectory {
    async fn find_thread(
        &self,
        ticket_id: i32,
        channel: ThreadChannel,
        target: &str,
    ) -> Result<Option<String>, ReadError> {
        Ok(self.thread(ticket_id, channel, target).await)
    }

    async fn record_thread(
        &self,
        ticket_id: i32,
        channel: ThreadChannel,
        target: &str,
        thread_key: &str,
    ) -> Result<(), ReadError> {
        self.inner
            .lock()
            .await
            .threads
            .entry((ticket_id, channel, target.to_string()))
            .or_insert_with(|| thread_key.to_string());
        Ok(())
    }
}
