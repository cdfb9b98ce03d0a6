use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entity::{
    category, sub_category, ticket, ticket_activity, ticket_status, ticket_thread, user,
};

use super::{
    DomainReader, ReadError, StatusChange, ThreadChannel, ThreadRegistry, TicketRecord,
    UserRecord,
};

/// Directory backed by the helpdesk's PostgreSQL tables.
#[derive(Clone)]
pub struct SeaOrmDirectory {
    db: DatabaseConnection,
}

impl SeaOrmDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<ticket::Model> for TicketRecord {
    fn from(m: ticket::Model) -> Self {
        Self {
            id: m.id,
            ticket_number: m.ticket_number,
            title: m.title,
            status_id: m.status_id,
            created_by: m.created_by,
            assigned_to: m.assigned_to,
            category_id: m.category_id,
            sub_category_id: m.sub_category_id,
        }
    }
}

impl From<user::Model> for UserRecord {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            role: m.role,
            chat_user_id: m.chat_user_id,
        }
    }
}

#[async_trait]
impl DomainReader for SeaOrmDirectory {
    async fn ticket(&self, id: i32) -> Result<Option<TicketRecord>, ReadError> {
        Ok(ticket::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into))
    }

    async fn user(&self, id: i32) -> Result<Option<UserRecord>, ReadError> {
        Ok(user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Into::into))
    }

    async fn status_label(&self, status_id: i32) -> Result<Option<String>, ReadError> {
        Ok(ticket_status::Entity::find_by_id(status_id)
            .one(&self.db)
            .await?
            .map(|s| s.label))
    }

    async fn category_name(&self, id: i32) -> Result<Option<String>, ReadError> {
        Ok(category::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|c| c.name))
    }

    async fn sub_category_name(&self, id: i32) -> Result<Option<String>, ReadError> {
        Ok(sub_category::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|c| c.name))
    }

    async fn latest_status_change(
        &self,
        ticket_id: i32,
        as_of: DateTime<Utc>,
    ) -> Result<Option<StatusChange>, ReadError> {
        let activity = ticket_activity::Entity::find()
            .filter(ticket_activity::Column::TicketId.eq(ticket_id))
            .filter(ticket_activity::Column::Action.eq(ticket_activity::STATUS_CHANGED))
            .filter(ticket_activity::Column::CreatedAt.lte(as_of))
            .order_by_desc(ticket_activity::Column::CreatedAt)
            .order_by_desc(ticket_activity::Column::Id)
            .one(&self.db)
            .await?;

        Ok(activity.map(|a| StatusChange {
            actor_id: a.actor_id,
            comment: a.comment.filter(|c| !c.trim().is_empty()),
        }))
    }
}

#[async_trait]
impl ThreadRegistry for SeaOrmDirectory {
    async fn find_thread(
        &self,
        ticket_id: i32,
        channel: ThreadChannel,
        target: &str,
    ) -> Result<Option<String>, ReadError> {
        Ok(ticket_thread::Entity::find()
            .filter(ticket_thread::Column::TicketId.eq(ticket_id))
            .filter(ticket_thread::Column::Channel.eq(channel.as_str()))
            .filter(ticket_thread::Column::Target.eq(target))
            .one(&self.db)
            .await?
            .map(|t| t.thread_key))
    }

    async fn record_thread(
        &self,
        ticket_id: i32,
        channel: ThreadChannel,
        target: &str,
        thread_key: &str,
    ) -> Result<(), ReadError> {
        let model = ticket_thread::ActiveModel {
            ticket_id: Set(ticket_id),
            channel: Set(channel.as_str().to_string()),
            target: Set(target.to_string()),
            thread_key: Set(thread_key.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = ticket_thread::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    ticket_thread::Column::TicketId,
                    ticket_thread::Column::Channel,
                    ticket_thread::Column::Target,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
