use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;

use super::{ChannelError, ChatAdapter, ChatMessage, ChatReceipt, check_status};

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for a Slack-compatible `chat.postMessage` endpoint.
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpChatClient {
    pub fn new(config: &ChatConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat.postMessage", config.api_url.trim_end_matches('/')),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl ChatAdapter for HttpChatClient {
    async fn post_message(&self, message: &ChatMessage) -> Result<ChatReceipt, ChannelError> {
        let request = PostMessageRequest {
            channel: &message.channel,
            text: &message.text,
            thread_ts: message.thread_ts.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;
        let response: PostMessageResponse = check_status(response)?
            .json()
            .await
            .map_err(|err| ChannelError::InvalidResponse(err.to_string()))?;

        if !response.ok {
            return Err(ChannelError::Rejected {
                reason: response.error.unwrap_or_else(|| "unknown_error".into()),
            });
        }

        let ts = response
            .ts
            .ok_or_else(|| ChannelError::InvalidResponse("missing message ts".into()))?;
        Ok(ChatReceipt { ts })
    }
}
