pub mod health;
pub mod outbox;
