use chrono::{DateTime, Utc};
use common::notification::TicketStatusUpdated;
use tracing::info;

use crate::enrichment::{friendly_name, optional_user, ticket_context};

use super::deliver::notify_user;
use super::render::{Notice, subject};
use super::router::HandlerContext;
use super::{Audience, DispatchError, DispatchOutcome, SkipReason};

/// Tell the ticket creator, in the ticket's thread, that its status moved.
///
/// Actor and comment come from the payload. When a producer omits them they
/// are read from the activity log as it stood when the event was written.
pub(super) async fn handle(
    ctx: &HandlerContext,
    event_id: i64,
    written_at: DateTime<Utc>,
    payload: &TicketStatusUpdated,
) -> Result<DispatchOutcome, DispatchError> {
    let Some(ticket) = ticket_context(ctx.reader.as_ref(), payload.ticket_id).await? else {
        info!(event_id, ticket_id = payload.ticket_id, "Ticket gone, skipping");
        return Ok(DispatchOutcome::Skipped(SkipReason::TicketNotFound));
    };
    let ticket_id = ticket.ticket.id;

    let Some(creator) = ctx.reader.user(ticket.ticket.created_by).await? else {
        return Ok(DispatchOutcome::Skipped(SkipReason::RecipientNotFound));
    };

    let payload_comment = payload
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let change = if payload.changed_by.is_some() && payload_comment.is_some() {
        None
    } else {
        ctx.reader.latest_status_change(ticket_id, written_at).await?
    };
    let actor_id = payload
        .changed_by
        .or_else(|| change.as_ref().and_then(|c| c.actor_id));
    let comment = match payload_comment {
        Some(comment) => Some(comment.to_string()),
        None => change.and_then(|c| c.comment),
    };
    let actor = optional_user(ctx.reader.as_ref(), actor_id).await?;

    let transition = match &payload.old_status {
        Some(old) => format!("from {old} to {}", payload.new_status),
        None => format!("to {}", payload.new_status),
    };
    let mut body = format!(
        "Hi {},\n\nYour ticket's status was changed {transition} by {}.",
        creator.display_name(),
        friendly_name(actor.as_ref()),
    );
    if let Some(comment) = comment {
        body.push_str(&format!("\n\nComment: {comment}"));
    }
    body.push_str(&format!(
        "\n\n{}",
        ctx.links.ticket_url(Audience::for_user(&creator), ticket_id)
    ));

    let notice = Notice {
        subject: subject(&ticket, "Status updated"),
        body,
    };
    let deliveries = notify_user(ctx, ticket_id, event_id, &creator, &notice).await?;

    Ok(DispatchOutcome::from_deliveries(deliveries))
}
