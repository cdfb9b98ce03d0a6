use common::OutboxStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A notification event written by a ticket lifecycle producer.
///
/// Rows are mutated only by the batch processor and never deleted here.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbox_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Producer-defined tag such as `ticket.created`.
    #[sea_orm(indexed)]
    pub event_type: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub payload: serde_json::Value,

    #[sea_orm(indexed)]
    pub status: OutboxStatus,

    /// Lower values are claimed first.
    pub priority: i32,

    /// Failed delivery attempts so far.
    pub attempts: i32,

    pub max_attempts: i32,

    /// Earliest time the event may be claimed.
    pub scheduled_at: DateTimeUtc,

    pub processing_started_at: Option<DateTimeUtc>,

    pub processed_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
