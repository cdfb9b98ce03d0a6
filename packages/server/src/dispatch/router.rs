use std::sync::Arc;

use async_trait::async_trait;
use common::NotificationEvent;
use tracing::{debug, info, warn};

use crate::channels::Channels;
use crate::enrichment::{DomainReader, ThreadRegistry};
use crate::entity::outbox_event;

use super::{
    DispatchError, DispatchOutcome, Dispatcher, PortalLinks, SkipReason, assigned, comment,
    created, status,
};

/// Everything a handler may touch.
#[derive(Clone)]
pub struct HandlerContext {
    pub reader: Arc<dyn DomainReader>,
    pub threads: Arc<dyn ThreadRegistry>,
    pub channels: Channels,
    pub links: PortalLinks,
}

/// Routes decoded events to their per-type handler.
pub struct DispatchRouter {
    ctx: HandlerContext,
}

impl DispatchRouter {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Dispatcher for DispatchRouter {
    async fn dispatch(
        &self,
        event: &outbox_event::Model,
    ) -> Result<DispatchOutcome, DispatchError> {
        let decoded = NotificationEvent::parse(&event.event_type, &event.payload)?;
        debug!(
            event_id = event.id,
            event_type = decoded.event_type(),
            ticket_id = ?decoded.ticket_id(),
            "Dispatching event"
        );

        match decoded {
            NotificationEvent::TicketCreated(p) => created::handle(&self.ctx, event.id, &p).await,
            NotificationEvent::TicketStatusUpdated(p) => {
                status::handle(&self.ctx, event.id, event.created_at, &p).await
            }
            NotificationEvent::TicketAssigned(p) => {
                assigned::handle(&self.ctx, event.id, &p).await
            }
            NotificationEvent::TicketCommentAdded(p) => {
                comment::handle(&self.ctx, event.id, &p).await
            }
            NotificationEvent::TicketEscalated(p) => {
                // Escalation has no delivery policy yet; the event is acknowledged.
                info!(
                    event_id = event.id,
                    ticket_id = p.ticket_id,
                    reason = p.reason.as_deref().unwrap_or("-"),
                    "Ticket escalation acknowledged"
                );
                Ok(DispatchOutcome::Acknowledged)
            }
            NotificationEvent::Unknown { event_type } => {
                warn!(
                    event_id = event.id,
                    event_type = %event_type,
                    "No handler for event type, completing as no-op"
                );
                Ok(DispatchOutcome::Skipped(SkipReason::UnknownEventType))
            }
        }
    }
}
