use crate::config::PortalConfig;
use crate::enrichment::{TicketContext, UserRecord};

/// Which portal view a link should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Staff ticket console.
    Internal,
    /// Requester-facing ticket page.
    External,
}

impl Audience {
    pub fn for_user(user: &UserRecord) -> Self {
        if user.is_staff() {
            Self::Internal
        } else {
            Self::External
        }
    }
}

/// Builds links and Message-IDs. Output depends only on its inputs, so a
/// redelivered event renders byte-identical notifications.
#[derive(Debug, Clone)]
pub struct PortalLinks {
    base_url: String,
    mail_domain: String,
}

impl PortalLinks {
    pub fn new(base_url: impl Into<String>, mail_domain: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            mail_domain: mail_domain.into(),
        }
    }

    pub fn ticket_url(&self, audience: Audience, ticket_id: i32) -> String {
        match audience {
            Audience::Internal => format!("{}/staff/tickets/{ticket_id}", self.base_url),
            Audience::External => format!("{}/tickets/{ticket_id}", self.base_url),
        }
    }

    /// Message-ID for one recipient of one event.
    pub fn message_id(&self, ticket_id: i32, event_id: i64, recipient_id: i32) -> String {
        format!(
            "<ticket-{ticket_id}.evt-{event_id}.u-{recipient_id}@{}>",
            self.mail_domain
        )
    }
}

impl From<&PortalConfig> for PortalLinks {
    fn from(config: &PortalConfig) -> Self {
        Self::new(&config.base_url, &config.mail_domain)
    }
}

/// A rendered notification, before it is addressed to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Notice {
    pub subject: String,
    pub body: String,
}

impl Notice {
    /// Chat text: subject line followed by the body.
    pub fn chat_text(&self) -> String {
        format!("*{}*\n{}", self.subject, self.body)
    }
}

pub(crate) fn subject(ctx: &TicketContext, what: &str) -> String {
    format!("[{}] {what}: {}", ctx.ticket.ticket_number, ctx.ticket.title)
}
