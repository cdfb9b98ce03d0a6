use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmailConfig;

use super::{ChannelError, EmailAdapter, EmailMessage, check_status};

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    headers: BTreeMap<&'static str, &'a str>,
}

/// Client for a JSON transactional email API.
///
/// Threading headers (`Message-ID`, `In-Reply-To`, `References`) are passed
/// through so mail clients group replies with the ticket's first email.
pub struct HttpEmailClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpEmailClient {
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let from = match &config.from_name {
            Some(name) => format!("{name} <{}>", config.from_address),
            None => config.from_address.clone(),
        };
        Ok(Self {
            client,
            endpoint: config.api_url.clone(),
            api_key: config.api_key.clone(),
            from,
        })
    }
}

#[async_trait]
impl EmailAdapter for HttpEmailClient {
    async fn send(&self, email: &EmailMessage) -> Result<(), ChannelError> {
        let mut headers = BTreeMap::new();
        headers.insert("Message-ID", email.message_id.as_str());
        if let Some(root) = email.in_reply_to.as_deref() {
            headers.insert("In-Reply-To", root);
            headers.insert("References", root);
        }

        let request = SendEmailRequest {
            from: self.from.clone(),
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.body,
            headers,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        check_status(response)?;

        Ok(())
    }
}
