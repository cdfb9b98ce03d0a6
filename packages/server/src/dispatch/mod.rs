//! Maps an outbox event to the enrichment and delivery it requires.
//!
//! Handlers classify their result explicitly: a [`DispatchOutcome`] finalizes
//! the event as completed, a [`DispatchError`] feeds the retry policy.

mod assigned;
mod comment;
mod created;
mod deliver;
mod render;
mod router;
mod status;

pub use render::{Audience, PortalLinks};
pub use router::{DispatchRouter, HandlerContext};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use common::PayloadError;

use crate::channels::ChannelError;
use crate::enrichment::ReadError;
use crate::entity::outbox_event;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),

    #[error("enrichment lookup failed: {0}")]
    Lookup(#[from] ReadError),

    #[error("delivery failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("handler timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Why a handler decided not to deliver anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TicketNotFound,
    RecipientNotFound,
    /// Internal notes never reach the ticket creator.
    InternalComment,
    /// The commenter is the only recipient.
    OwnComment,
    ChannelUnavailable,
    UnknownEventType,
    NoDeliverableChannel,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TicketNotFound => "ticket not found",
            Self::RecipientNotFound => "recipient not found",
            Self::InternalComment => "internal comment",
            Self::OwnComment => "comment by ticket creator",
            Self::ChannelUnavailable => "no channel configured",
            Self::UnknownEventType => "unknown event type",
            Self::NoDeliverableChannel => "recipient has no reachable channel",
        };
        f.write_str(s)
    }
}

/// Successful handler result. Every variant completes the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { deliveries: usize },
    Skipped(SkipReason),
    /// Seen and intentionally not acted on.
    Acknowledged,
}

impl DispatchOutcome {
    /// `Delivered` with zero deliveries collapses into a skip.
    pub(crate) fn from_deliveries(deliveries: usize) -> Self {
        if deliveries == 0 {
            Self::Skipped(SkipReason::NoDeliverableChannel)
        } else {
            Self::Delivered { deliveries }
        }
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, event: &outbox_event::Model)
    -> Result<DispatchOutcome, DispatchError>;
}
