//! Delivery channels. Each adapter exposes one send operation that either
//! succeeds or returns an error; failures are never swallowed here.

mod chat;
mod email;

pub use chat::HttpChatClient;
pub use email::HttpEmailClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the message: {reason}")]
    Rejected { reason: String },

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// Classify a provider's non-success status: throttling and server faults are
/// `Unavailable`, anything else is a rejection of this message.
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(ChannelError::Unavailable(format!("provider returned {status}")))
    } else {
        Err(ChannelError::Rejected {
            reason: format!("provider returned {status}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Channel id or member id for a direct message.
    pub channel: String,
    pub text: String,
    /// Reply into this thread when set.
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReceipt {
    /// Timestamp of the posted message; usable as a thread root.
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub message_id: String,
    /// Root Message-ID of the thread this email replies to.
    pub in_reply_to: Option<String>,
}

#[async_trait]
pub trait ChatAdapter: Send + Sync {
    async fn post_message(&self, message: &ChatMessage) -> Result<ChatReceipt, ChannelError>;
}

#[async_trait]
pub trait EmailAdapter: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), ChannelError>;
}

/// The adapters available to handlers. A `None` channel is not configured.
#[derive(Clone, Default)]
pub struct Channels {
    pub chat: Option<Arc<dyn ChatAdapter>>,
    pub email: Option<Arc<dyn EmailAdapter>>,
    /// Chat channel for new-ticket announcements.
    pub team_channel: Option<String>,
}

impl Channels {
    /// Build HTTP adapters for every configured channel.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChannelError> {
        let timeout = Duration::from_secs(config.outbox.handler_timeout_secs);

        let chat = match &config.chat {
            Some(chat) => Some(Arc::new(HttpChatClient::new(chat, timeout)?) as Arc<dyn ChatAdapter>),
            None => None,
        };
        let email = match &config.email {
            Some(email) => {
                Some(Arc::new(HttpEmailClient::new(email, timeout)?) as Arc<dyn EmailAdapter>)
            }
            None => None,
        };

        Ok(Self {
            chat,
            email,
            team_channel: config.chat.as_ref().and_then(|c| c.team_channel.clone()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.chat.is_none() && self.email.is_none()
    }
}
