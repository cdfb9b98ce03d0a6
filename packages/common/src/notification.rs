use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tags written by ticket lifecycle producers.
pub mod event_type {
    pub const TICKET_CREATED: &str = "ticket.created";
    pub const TICKET_STATUS_UPDATED: &str = "ticket.status_updated";
    pub const TICKET_ASSIGNED: &str = "ticket.assigned";
    pub const TICKET_ESCALATED: &str = "ticket.escalated";
    pub const TICKET_COMMENT_ADDED: &str = "ticket.comment_added";
}

/// Payload of `ticket.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCreated {
    pub ticket_id: i32,
}

/// Payload of `ticket.status_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatusUpdated {
    pub ticket_id: i32,
    #[serde(default)]
    pub old_status: Option<String>,
    pub new_status: String,
    /// User who made the change, if the producer knows it.
    #[serde(default)]
    pub changed_by: Option<i32>,
    /// Note the actor attached to the transition, captured when the event was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Payload of `ticket.assigned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketAssigned {
    pub ticket_id: i32,
    pub assignee_id: i32,
    #[serde(default)]
    pub assigned_by: Option<i32>,
    /// Set when an existing ticket was forwarded to someone else.
    #[serde(default)]
    pub forwarded: bool,
}

/// Payload of `ticket.comment_added`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCommentAdded {
    pub ticket_id: i32,
    pub author_id: i32,
    pub content: String,
    /// Staff-only note. Never delivered to the ticket creator.
    #[serde(default)]
    pub is_internal: bool,
}

/// Payload of `ticket.escalated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketEscalated {
    pub ticket_id: i32,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A decoded outbox event.
///
/// Every known `event_type` maps to a typed payload. Anything else lands in
/// [`NotificationEvent::Unknown`] so that new producer types never poison the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    TicketCreated(TicketCreated),
    TicketStatusUpdated(TicketStatusUpdated),
    TicketAssigned(TicketAssigned),
    TicketCommentAdded(TicketCommentAdded),
    TicketEscalated(TicketEscalated),
    Unknown { event_type: String },
}

/// A known event type whose payload does not match its expected shape.
#[derive(Debug, thiserror::Error)]
#[error("invalid payload for '{event_type}': {source}")]
pub struct PayloadError {
    pub event_type: String,
    #[source]
    pub source: serde_json::Error,
}

fn decode<'a, T: Deserialize<'a>>(event_type: &str, payload: &'a Value) -> Result<T, PayloadError> {
    T::deserialize(payload).map_err(|source| PayloadError {
        event_type: event_type.to_string(),
        source,
    })
}

impl NotificationEvent {
    /// Decode a stored `(event_type, payload)` pair.
    pub fn parse(event_type: &str, payload: &Value) -> Result<Self, PayloadError> {
        let event = match event_type {
            event_type::TICKET_CREATED => Self::TicketCreated(decode(event_type, payload)?),
            event_type::TICKET_STATUS_UPDATED => {
                Self::TicketStatusUpdated(decode(event_type, payload)?)
            }
            event_type::TICKET_ASSIGNED => Self::TicketAssigned(decode(event_type, payload)?),
            event_type::TICKET_COMMENT_ADDED => {
                Self::TicketCommentAdded(decode(event_type, payload)?)
            }
            event_type::TICKET_ESCALATED => Self::TicketEscalated(decode(event_type, payload)?),
            other => Self::Unknown {
                event_type: other.to_string(),
            },
        };
        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::TicketCreated(_) => event_type::TICKET_CREATED,
            Self::TicketStatusUpdated(_) => event_type::TICKET_STATUS_UPDATED,
            Self::TicketAssigned(_) => event_type::TICKET_ASSIGNED,
            Self::TicketCommentAdded(_) => event_type::TICKET_COMMENT_ADDED,
            Self::TicketEscalated(_) => event_type::TICKET_ESCALATED,
            Self::Unknown { event_type } => event_type,
        }
    }

    pub fn ticket_id(&self) -> Option<i32> {
        match self {
            Self::TicketCreated(p) => Some(p.ticket_id),
            Self::TicketStatusUpdated(p) => Some(p.ticket_id),
            Self::TicketAssigned(p) => Some(p.ticket_id),
            Self::TicketCommentAdded(p) => Some(p.ticket_id),
            Self::TicketEscalated(p) => Some(p.ticket_id),
            Self::Unknown { .. } => None,
        }
    }

    /// Serialize the payload back into the stored JSON shape.
    ///
    /// Producers use this to build outbox rows; `Unknown` has no payload of its own.
    pub fn payload(&self) -> Value {
        let value = match self {
            Self::TicketCreated(p) => serde_json::to_value(p),
            Self::TicketStatusUpdated(p) => serde_json::to_value(p),
            Self::TicketAssigned(p) => serde_json::to_value(p),
            Self::TicketCommentAdded(p) => serde_json::to_value(p),
            Self::TicketEscalated(p) => serde_json::to_value(p),
            Self::Unknown { .. } => Ok(Value::Null),
        };
        value.unwrap_or_default()
    }
}
