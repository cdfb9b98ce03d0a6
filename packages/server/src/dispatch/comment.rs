use common::notification::TicketCommentAdded;
use tracing::info;

use crate::enrichment::{friendly_name, ticket_context};

use super::deliver::notify_user;
use super::render::{Notice, subject};
use super::router::HandlerContext;
use super::{Audience, DispatchError, DispatchOutcome, SkipReason};

/// Forward a public comment to the ticket creator. Internal notes stop here,
/// before any lookup or adapter call.
pub(super) async fn handle(
    ctx: &HandlerContext,
    event_id: i64,
    payload: &TicketCommentAdded,
) -> Result<DispatchOutcome, DispatchError> {
    if payload.is_internal {
        info!(event_id, ticket_id = payload.ticket_id, "Internal comment, not delivered");
        return Ok(DispatchOutcome::Skipped(SkipReason::InternalComment));
    }

    let Some(ticket) = ticket_context(ctx.reader.as_ref(), payload.ticket_id).await? else {
        info!(event_id, ticket_id = payload.ticket_id, "Ticket gone, skipping");
        return Ok(DispatchOutcome::Skipped(SkipReason::TicketNotFound));
    };
    let ticket_id = ticket.ticket.id;

    if payload.author_id == ticket.ticket.created_by {
        return Ok(DispatchOutcome::Skipped(SkipReason::OwnComment));
    }

    let Some(creator) = ctx.reader.user(ticket.ticket.created_by).await? else {
        return Ok(DispatchOutcome::Skipped(SkipReason::RecipientNotFound));
    };
    let author = ctx.reader.user(payload.author_id).await?;

    let notice = Notice {
        subject: subject(&ticket, "New comment"),
        body: format!(
            "Hi {},\n\n{} commented on your ticket:\n\n{}\n\n{}",
            creator.display_name(),
            friendly_name(author.as_ref()),
            payload.content.trim(),
            ctx.links.ticket_url(Audience::for_user(&creator), ticket_id),
        ),
    };
    let deliveries = notify_user(ctx, ticket_id, event_id, &creator, &notice).await?;

    Ok(DispatchOutcome::from_deliveries(deliveries))
}
