//! Read-only lookups that turn identifiers in an event payload into
//! human-meaningful context.
//!
//! Missing optional relations never fail a lookup; they render as the
//! fallback labels below.

mod database;
mod memory;

pub use database::SeaOrmDirectory;
pub use memory::InMemoryDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const GENERAL: &str = "General";
pub const UNKNOWN_STATUS: &str = "Unknown status";
pub const UNASSIGNED: &str = "Unassigned";
pub const SUPPORT_TEAM: &str = "Support Team";

/// Roles that see the internal ticket view.
const STAFF_ROLES: &[&str] = &["staff", "admin", "super_admin"];

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("lookup failed: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRecord {
    pub id: i32,
    pub ticket_number: String,
    pub title: String,
    pub status_id: i32,
    pub created_by: i32,
    pub assigned_to: Option<i32>,
    pub category_id: Option<i32>,
    pub sub_category_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub chat_user_id: Option<String>,
}

impl UserRecord {
    pub fn is_staff(&self) -> bool {
        STAFF_ROLES.contains(&self.role.as_str())
    }

    /// Name to show in notifications instead of a raw id.
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        match self.email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => format!("User #{}", self.id),
        }
    }
}

/// A status transition recorded in the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub actor_id: Option<i32>,
    pub comment: Option<String>,
}

/// Channel kind a conversation thread lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadChannel {
    Chat,
    Email,
}

impl ThreadChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Email => "email",
        }
    }
}

/// Queries against the helpdesk domain tables.
#[async_trait]
pub trait DomainReader: Send + Sync {
    async fn ticket(&self, id: i32) -> Result<Option<TicketRecord>, ReadError>;

    async fn user(&self, id: i32) -> Result<Option<UserRecord>, ReadError>;

    async fn status_label(&self, status_id: i32) -> Result<Option<String>, ReadError>;

    async fn category_name(&self, id: i32) -> Result<Option<String>, ReadError>;

    async fn sub_category_name(&self, id: i32) -> Result<Option<String>, ReadError>;

    /// Newest status-change activity recorded at or before `as_of`.
    async fn latest_status_change(
        &self,
        ticket_id: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, ReadError>;
}

/// Conversation threads recorded per ticket, so later notifications reply
/// into the same thread.
#[async_trait]
pub trait ThreadRegistry: Send + Sync {
    async fn find_thread(
        &self,
        ticket_id: i32,
        channel: ThreadChannel,
        target: &str,
    ) -> Result<Option<String>, ReadError>;

    /// Record a thread root. A root already recorded for the same key is kept.
    async fn record_thread(
        &self,
        ticket_id: i32,
        channel: ThreadChannel,
        target: &str,
        thread_key: &str,
    ) -> Result<(), ReadError>;
}

/// A ticket with its labels resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketContext {
    pub ticket: TicketRecord,
    pub status_label: String,
    pub category: String,
    pub sub_category: String,
}

/// Load a ticket and resolve its labels. `None` if the ticket no longer exists.
pub async fn ticket_context(
    reader: &dyn DomainReader,
    ticket_id: i32,
) -> Result<Option<TicketContext>, ReadError> {
    let Some(ticket) = reader.ticket(ticket_id).await? else {
        return Ok(None);
    };

    let status_label = reader
        .status_label(ticket.status_id)
        .await?
        .unwrap_or_else(|| UNKNOWN_STATUS.to_string());

    let category = match ticket.category_id {
        Some(id) => reader.category_name(id).await?,
        None => None,
    }
    .unwrap_or_else(|| UNCATEGORIZED.to_string());

    let sub_category = match ticket.sub_category_id {
        Some(id) => reader.sub_category_name(id).await?,
        None => None,
    }
    .unwrap_or_else(|| GENERAL.to_string());

    Ok(Some(TicketContext {
        ticket,
        status_label,
        category,
        sub_category,
    }))
}

/// Look up an optional user, treating an absent id as absent user.
pub async fn optional_user(
    reader: &dyn DomainReader,
    id: Option<i32>,
) -> Result<Option<UserRecord>, ReadError> {
    match id {
        Some(id) => reader.user(id).await,
        None => Ok(None),
    }
}

/// Friendly name for an optional user.
pub fn friendly_name(user: Option<&UserRecord>) -> String {
    user.map(UserRecord::display_name)
        .unwrap_or_else(|| SUPPORT_TEAM.to_string())
}
