use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Helpdesk ticket. Owned by the portal; read-only for the outbox engine.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Human-facing reference, e.g. `HD-2024-0042`.
    #[sea_orm(unique)]
    pub ticket_number: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub status_id: i32,

    #[sea_orm(indexed)]
    pub created_by: i32,

    #[sea_orm(indexed)]
    pub assigned_to: Option<i32>,

    pub category_id: Option<i32>,

    pub sub_category_id: Option<i32>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
