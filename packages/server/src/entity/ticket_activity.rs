use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Action tag written for status transitions.
pub const STATUS_CHANGED: &str = "status_changed";

/// Audit trail of ticket changes.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_activity")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub ticket_id: i32,

    pub actor_id: Option<i32>,

    pub action: String,

    /// Optional note left with the change.
    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
