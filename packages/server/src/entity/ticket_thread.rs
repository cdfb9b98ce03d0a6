use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Conversation thread opened for a ticket on one channel target.
///
/// Unique on `(ticket_id, channel, target)`; the first recorded root wins.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_thread")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub ticket_id: i32,

    /// `chat` or `email`.
    pub channel: String,

    /// Chat channel id or email address.
    pub target: String,

    /// Chat message timestamp or root email Message-ID.
    pub thread_key: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
