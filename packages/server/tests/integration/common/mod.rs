use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;

use server::channels::{
    ChannelError, ChatAdapter, ChatMessage, ChatReceipt, Channels, EmailAdapter, EmailMessage,
};
use server::config::{AppConfig, AuthConfig, DatabaseConfig, OutboxConfig, PortalConfig, ServerConfig};
use server::dispatch::{DispatchRouter, HandlerContext, PortalLinks};
use server::enrichment::{InMemoryDirectory, TicketRecord, UserRecord};
use server::entity::outbox_event;
use server::outbox::{InMemoryOutboxStore, NewOutboxEvent, OutboxStore, lease_from};
use server::processor::BatchProcessor;
use server::state::AppState;

pub const CRON_SECRET: &str = "test-cron-secret";
pub const BASE_URL: &str = "https://help.campus.test";
pub const MAIL_DOMAIN: &str = "help.campus.test";
pub const TEAM_CHANNEL: &str = "C-HELPDESK";

pub mod routes {
    pub const PROCESS: &str = "/api/v1/outbox/process";
    pub const STATS: &str = "/api/v1/outbox/stats";
    pub const DEAD_LETTERS: &str = "/api/v1/outbox/dead-letters";
    pub const HEALTH: &str = "/health";
}

/// Chat adapter that records every post. Fails the first `fail_times` calls.
#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<ChatMessage>>,
    fail_times: AtomicU32,
    calls: AtomicU32,
}

impl RecordingChat {
    pub fn failing(times: u32) -> Self {
        Self {
            fail_times: AtomicU32::new(times),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatAdapter for RecordingChat {
    async fn post_message(&self, message: &ChatMessage) -> Result<ChatReceipt, ChannelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_times.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("chat API returned 503".into()));
        }
        let mut sent = self.sent.lock().await;
        sent.push(message.clone());
        Ok(ChatReceipt {
            ts: format!("1700000000.{:06}", sent.len()),
        })
    }
}

/// Email adapter that records every send. Fails the first `fail_times` calls.
#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
    fail_times: AtomicU32,
    calls: AtomicU32,
}

impl RecordingEmail {
    pub fn failing(times: u32) -> Self {
        Self {
            fail_times: AtomicU32::new(times),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailAdapter for RecordingEmail {
    async fn send(&self, email: &EmailMessage) -> Result<(), ChannelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_times.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("mail relay unreachable".into()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

/// Engine wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<InMemoryOutboxStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub chat: Arc<RecordingChat>,
    pub email: Arc<RecordingEmail>,
    pub router: Arc<DispatchRouter>,
    pub processor: Arc<BatchProcessor>,
    pub config: OutboxConfig,
}

pub struct HarnessBuilder {
    chat: Option<RecordingChat>,
    email: Option<RecordingEmail>,
    team_channel: Option<String>,
    config: OutboxConfig,
}

impl HarnessBuilder {
    pub fn without_chat(mut self) -> Self {
        self.chat = None;
        self
    }

    pub fn without_email(mut self) -> Self {
        self.email = None;
        self
    }

    pub fn without_team_channel(mut self) -> Self {
        self.team_channel = None;
        self
    }

    pub fn chat(mut self, chat: RecordingChat) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn email(mut self, email: RecordingEmail) -> Self {
        self.email = Some(email);
        self
    }

    pub fn config(mut self, config: OutboxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(InMemoryOutboxStore::new().with_lease(lease_from(&self.config)));
        let directory = Arc::new(InMemoryDirectory::new());
        let chat_configured = self.chat.is_some();
        let email_configured = self.email.is_some();
        let chat = Arc::new(self.chat.unwrap_or_default());
        let email = Arc::new(self.email.unwrap_or_default());

        let channels = Channels {
            chat: chat_configured.then(|| chat.clone() as Arc<dyn ChatAdapter>),
            email: email_configured.then(|| email.clone() as Arc<dyn EmailAdapter>),
            team_channel: self.team_channel,
        };
        let router = Arc::new(DispatchRouter::new(HandlerContext {
            reader: directory.clone(),
            threads: directory.clone(),
            channels,
            links: PortalLinks::new(BASE_URL, MAIL_DOMAIN),
        }));
        let processor = Arc::new(BatchProcessor::new(
            store.clone(),
            router.clone(),
            self.config.clone(),
        ));

        Harness {
            store,
            directory,
            chat,
            email,
            router,
            processor,
            config: self.config,
        }
    }
}

impl Harness {
    /// Both channels configured, nothing failing.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            chat: Some(RecordingChat::default()),
            email: Some(RecordingEmail::default()),
            team_channel: Some(TEAM_CHANNEL.to_string()),
            config: OutboxConfig::default(),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub async fn enqueue(&self, event_type: &str, payload: Value, now: DateTime<Utc>) -> i64 {
        self.store
            .insert(NewOutboxEvent::raw(event_type, payload, &self.config), now)
            .await
            .id
    }

    pub async fn event(&self, id: i64) -> outbox_event::Model {
        self.store.get(id).await.expect("event exists")
    }

    /// Seed a status, a category pair and a ticket.
    pub async fn seed_ticket(&self, id: i32, created_by: i32, assigned_to: Option<i32>) {
        self.directory.add_status(1, "Open").await;
        self.directory.add_category(1, "Network").await;
        self.directory.add_sub_category(1, "Wi-Fi").await;
        self.directory
            .add_ticket(TicketRecord {
                id,
                ticket_number: format!("HD-{id:04}"),
                title: "Wi-Fi drops in hostel block C".into(),
                status_id: 1,
                created_by,
                assigned_to,
                category_id: Some(1),
                sub_category_id: Some(1),
            })
            .await;
    }

    pub async fn seed_user(&self, id: i32, name: &str, role: &str, chat_user_id: Option<&str>) {
        self.directory
            .add_user(UserRecord {
                id,
                name: name.into(),
                email: format!("user{id}@campus.test"),
                role: role.into(),
                chat_user_id: chat_user_id.map(Into::into),
            })
            .await;
    }
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}

/// A running test server backed by an in-memory engine.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub harness: Harness,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
        },
        auth: AuthConfig {
            cron_secret: CRON_SECRET.to_string(),
        },
        outbox: OutboxConfig::default(),
        portal: PortalConfig {
            base_url: BASE_URL.to_string(),
            mail_domain: MAIL_DOMAIN.to_string(),
        },
        chat: None,
        email: None,
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(test_config()).await
    }

    pub async fn spawn_with_config(config: AppConfig) -> Self {
        let harness = Harness::new();
        let state = AppState {
            config: Arc::new(config),
            store: harness.store.clone() as Arc<dyn OutboxStore>,
            processor: harness.processor.clone(),
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            harness,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_header(&self, path: &str, header: &str, value: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header(header, value)
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        self.get_with_header(path, "Authorization", &format!("Bearer {token}"))
            .await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }
}
