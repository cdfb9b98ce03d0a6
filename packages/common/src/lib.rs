pub mod config;
pub mod notification;
pub mod outbox_status;
pub mod retry;

pub use config::OutboxConfig;
pub use notification::{NotificationEvent, PayloadError, event_type};
pub use outbox_status::OutboxStatus;
pub use retry::RetryDecision;
