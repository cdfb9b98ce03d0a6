use tracing::debug;

use crate::channels::{ChatMessage, EmailMessage};
use crate::enrichment::{ThreadChannel, UserRecord};

use super::DispatchError;
use super::render::Notice;
use super::router::HandlerContext;

/// Deliver a notice to one user on every channel that can reach them.
///
/// Returns the number of deliveries made. An unconfigured channel, or a user
/// without an address on it, is skipped silently.
pub(crate) async fn notify_user(
    ctx: &HandlerContext,
    ticket_id: i32,
    event_id: i64,
    user: &UserRecord,
    notice: &Notice,
) -> Result<usize, DispatchError> {
    let mut deliveries = 0;

    if ctx.channels.email.is_some() && !user.email.is_empty() {
        let message_id = ctx.links.message_id(ticket_id, event_id, user.id);
        send_threaded_email(ctx, ticket_id, &user.email, message_id, notice).await?;
        deliveries += 1;
    }

    if let Some(target) = user.chat_user_id.as_deref() {
        deliveries += post_threaded_chat(ctx, ticket_id, target, notice).await?;
    }

    Ok(deliveries)
}

/// Post to the team channel, if one is configured.
pub(crate) async fn notify_team(
    ctx: &HandlerContext,
    ticket_id: i32,
    notice: &Notice,
) -> Result<usize, DispatchError> {
    match ctx.channels.team_channel.as_deref() {
        Some(channel) => post_threaded_chat(ctx, ticket_id, channel, notice).await,
        None => Ok(0),
    }
}

async fn send_threaded_email(
    ctx: &HandlerContext,
    ticket_id: i32,
    to: &str,
    message_id: String,
    notice: &Notice,
) -> Result<(), DispatchError> {
    let Some(email) = &ctx.channels.email else {
        return Ok(());
    };

    // A redelivery finds its own Message-ID as the root; it must not reply to itself.
    let in_reply_to = ctx
        .threads
        .find_thread(ticket_id, ThreadChannel::Email, to)
        .await?
        .filter(|root| *root != message_id);
    let starts_thread = in_reply_to.is_none();

    email
        .send(&EmailMessage {
            to: to.to_string(),
            subject: notice.subject.clone(),
            body: notice.body.clone(),
            message_id: message_id.clone(),
            in_reply_to,
        })
        .await?;
    debug!(ticket_id, message_id = %message_id, "Email sent");

    if starts_thread {
        ctx.threads
            .record_thread(ticket_id, ThreadChannel::Email, to, &message_id)
            .await?;
    }
    Ok(())
}

async fn post_threaded_chat(
    ctx: &HandlerContext,
    ticket_id: i32,
    target: &str,
    notice: &Notice,
) -> Result<usize, DispatchError> {
    let Some(chat) = &ctx.channels.chat else {
        return Ok(0);
    };

    let thread_ts = ctx
        .threads
        .find_thread(ticket_id, ThreadChannel::Chat, target)
        .await?;

    let receipt = chat
        .post_message(&ChatMessage {
            channel: target.to_string(),
            text: notice.chat_text(),
            thread_ts: thread_ts.clone(),
        })
        .await?;
    debug!(ticket_id, channel = %target, ts = %receipt.ts, "Chat message posted");

    if thread_ts.is_none() {
        ctx.threads
            .record_thread(ticket_id, ThreadChannel::Chat, target, &receipt.ts)
            .await?;
    }
    Ok(1)
}
