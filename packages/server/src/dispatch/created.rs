use common::notification::TicketCreated;
use tracing::info;

use crate::enrichment::{UNASSIGNED, UserRecord, friendly_name, ticket_context};

use super::deliver::{notify_team, notify_user};
use super::render::{Notice, subject};
use super::router::HandlerContext;
use super::{Audience, DispatchError, DispatchOutcome, SkipReason};

/// Announce a new ticket to the team, confirm receipt to the creator and
/// notify the assignee if one was set at creation.
pub(super) async fn handle(
    ctx: &HandlerContext,
    event_id: i64,
    payload: &TicketCreated,
) -> Result<DispatchOutcome, DispatchError> {
    let Some(ticket) = ticket_context(ctx.reader.as_ref(), payload.ticket_id).await? else {
        info!(event_id, ticket_id = payload.ticket_id, "Ticket gone, skipping");
        return Ok(DispatchOutcome::Skipped(SkipReason::TicketNotFound));
    };
    let ticket_id = ticket.ticket.id;

    let creator = ctx.reader.user(ticket.ticket.created_by).await?;
    let assignee: Option<UserRecord> = match ticket.ticket.assigned_to {
        Some(id) if Some(id) == creator.as_ref().map(|c| c.id) => creator.clone(),
        Some(id) => ctx.reader.user(id).await?,
        None => None,
    };

    let assignee_name = match (&ticket.ticket.assigned_to, &assignee) {
        (None, _) => UNASSIGNED.to_string(),
        (Some(_), user) => friendly_name(user.as_ref()),
    };
    let summary = format!(
        "Category: {} / {}\nStatus: {}\nAssignee: {assignee_name}",
        ticket.category, ticket.sub_category, ticket.status_label,
    );

    let mut deliveries = 0;

    let team_notice = Notice {
        subject: subject(&ticket, "New ticket"),
        body: format!(
            "Raised by {}\n{summary}\n{}",
            friendly_name(creator.as_ref()),
            ctx.links.ticket_url(Audience::Internal, ticket_id),
        ),
    };
    deliveries += notify_team(ctx, ticket_id, &team_notice).await?;

    if let Some(creator) = &creator {
        let notice = Notice {
            subject: subject(&ticket, "Ticket received"),
            body: format!(
                "Hi {},\n\nWe have received your ticket and will get back to you soon.\n\n{summary}\n\nTrack it here: {}",
                creator.display_name(),
                ctx.links
                    .ticket_url(Audience::for_user(creator), ticket_id),
            ),
        };
        deliveries += notify_user(ctx, ticket_id, event_id, creator, &notice).await?;
    }

    if let Some(assignee) = assignee.as_ref().filter(|a| Some(a.id) != creator.as_ref().map(|c| c.id)) {
        let notice = Notice {
            subject: subject(&ticket, "Ticket assigned to you"),
            body: format!(
                "Hi {},\n\nA new ticket raised by {} has been assigned to you.\n\n{summary}\n\n{}",
                assignee.display_name(),
                friendly_name(creator.as_ref()),
                ctx.links
                    .ticket_url(Audience::for_user(assignee), ticket_id),
            ),
        };
        deliveries += notify_user(ctx, ticket_id, event_id, assignee, &notice).await?;
    }

    Ok(DispatchOutcome::from_deliveries(deliveries))
}
