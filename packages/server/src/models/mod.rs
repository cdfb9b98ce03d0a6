pub mod outbox;
pub mod shared;
