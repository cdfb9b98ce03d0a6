use common::notification::TicketAssigned;
use tracing::info;

use crate::enrichment::{friendly_name, optional_user, ticket_context};

use super::deliver::notify_user;
use super::render::{Notice, subject};
use super::router::HandlerContext;
use super::{Audience, DispatchError, DispatchOutcome, SkipReason};

/// Notify the new assignee. A forwarded ticket also tells its creator who
/// now owns it.
pub(super) async fn handle(
    ctx: &HandlerContext,
    event_id: i64,
    payload: &TicketAssigned,
) -> Result<DispatchOutcome, DispatchError> {
    if ctx.channels.is_empty() {
        info!(event_id, ticket_id = payload.ticket_id, "No channel configured, skipping");
        return Ok(DispatchOutcome::Skipped(SkipReason::ChannelUnavailable));
    }

    let Some(ticket) = ticket_context(ctx.reader.as_ref(), payload.ticket_id).await? else {
        info!(event_id, ticket_id = payload.ticket_id, "Ticket gone, skipping");
        return Ok(DispatchOutcome::Skipped(SkipReason::TicketNotFound));
    };
    let ticket_id = ticket.ticket.id;

    let Some(assignee) = ctx.reader.user(payload.assignee_id).await? else {
        return Ok(DispatchOutcome::Skipped(SkipReason::RecipientNotFound));
    };
    let assignor = optional_user(ctx.reader.as_ref(), payload.assigned_by).await?;
    let assignor_name = friendly_name(assignor.as_ref());

    let verb = if payload.forwarded { "forwarded" } else { "assigned" };
    let notice = Notice {
        subject: subject(&ticket, "Ticket assigned to you"),
        body: format!(
            "Hi {},\n\n{assignor_name} {verb} this ticket to you.\nCategory: {} / {}\nStatus: {}\n\n{}",
            assignee.display_name(),
            ticket.category,
            ticket.sub_category,
            ticket.status_label,
            ctx.links.ticket_url(Audience::for_user(&assignee), ticket_id),
        ),
    };
    let mut deliveries = notify_user(ctx, ticket_id, event_id, &assignee, &notice).await?;

    if payload.forwarded && ticket.ticket.created_by != assignee.id {
        if let Some(creator) = ctx.reader.user(ticket.ticket.created_by).await? {
            let notice = Notice {
                subject: subject(&ticket, "Ticket forwarded"),
                body: format!(
                    "Hi {},\n\nYour ticket has been forwarded to {} by {assignor_name}.\n\n{}",
                    creator.display_name(),
                    assignee.display_name(),
                    ctx.links.ticket_url(Audience::for_user(&creator), ticket_id),
                ),
            };
            deliveries += notify_user(ctx, ticket_id, event_id, &creator, &notice).await?;
        }
    }

    Ok(DispatchOutcome::from_deliveries(deliveries))
}
