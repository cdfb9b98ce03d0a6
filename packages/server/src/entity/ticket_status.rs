use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_status")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Machine name, e.g. `in_progress`.
    #[sea_orm(unique)]
    pub name: String,

    /// Display label, e.g. `In Progress`.
    pub label: String,
}

impl ActiveModelBehavior for ActiveModel {}
