pub mod category;
pub mod outbox_event;
pub mod sub_category;
pub mod ticket;
pub mod ticket_activity;
pub mod ticket_status;
pub mod ticket_thread;
pub mod user;
