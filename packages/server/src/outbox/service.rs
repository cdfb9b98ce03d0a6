use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{OutboxConfig, OutboxStatus};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::entity::outbox_event;

use super::{NewOutboxEvent, OutboxStats, OutboxStore, StoreError, Transition, lease_from};

/// Insert an event inside the caller's unit of work.
///
/// Producers pass their own transaction so the event commits (or rolls back)
/// together with the state change it describes.
pub async fn enqueue<C: ConnectionTrait>(
    conn: &C,
    event: NewOutboxEvent,
) -> Result<outbox_event::Model, DbErr> {
    let now = Utc::now();
    let model = outbox_event::ActiveModel {
        event_type: Set(event.event_type),
        payload: Set(event.payload),
        status: Set(OutboxStatus::Pending),
        priority: Set(event.priority),
        attempts: Set(0),
        max_attempts: Set(event.max_attempts),
        scheduled_at: Set(event.scheduled_at.unwrap_or(now)),
        processing_started_at: Set(None),
        processed_at: Set(None),
        last_error: Set(None),
        created_at: Set(now),
        ..Default::default()
    };
    model.insert(conn).await
}

/// PostgreSQL-backed outbox.
#[derive(Clone)]
pub struct PgOutboxStore {
    db: DatabaseConnection,
    lease: Duration,
}

impl PgOutboxStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            lease: lease_from(&OutboxConfig::default()),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Pending rows that are due, plus processing rows whose lease has expired.
    fn claimable(&self, now: DateTime<Utc>) -> sea_orm::Select<outbox_event::Entity> {
        outbox_event::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(outbox_event::Column::Status.eq(OutboxStatus::Pending))
                            .add(outbox_event::Column::ScheduledAt.lte(now)),
                    )
                    .add(
                        Condition::all()
                            .add(outbox_event::Column::Status.eq(OutboxStatus::Processing))
                            .add(outbox_event::Column::ProcessingStartedAt.lt(now - self.lease)),
                    ),
            )
            .filter(Expr::cust("attempts < max_attempts"))
    }

    /// Single-row move to `next`, guarded by the lifecycle graph.
    async fn advance(
        &self,
        id: i64,
        next: OutboxStatus,
        update: sea_orm::UpdateMany<outbox_event::Entity>,
    ) -> Result<Transition, StoreError> {
        let result = update
            .col_expr(outbox_event::Column::Status, Expr::value(next))
            .filter(outbox_event::Column::Id.eq(id))
            .filter(outbox_event::Column::Status.is_in(OutboxStatus::sources_of(next)))
            .exec(&self.db)
            .await?;

        Ok(Self::transition(result.rows_affected))
    }

    fn transition(rows_affected: u64) -> Transition {
        if rows_affected > 0 {
            Transition::Applied
        } else {
            Transition::Stale
        }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        batch_size: u64,
    ) -> Result<Vec<outbox_event::Model>, StoreError> {
        let txn = self.db.begin().await?;

        // SKIP LOCKED lets overlapping invocations claim disjoint rows.
        let mut claimed = self
            .claimable(now)
            .order_by_asc(outbox_event::Column::Priority)
            .order_by_asc(outbox_event::Column::CreatedAt)
            .order_by_asc(outbox_event::Column::Id)
            .limit(batch_size)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        if claimed.is_empty() {
            txn.commit().await?;
            return Ok(claimed);
        }

        let ids: Vec<i64> = claimed.iter().map(|e| e.id).collect();
        outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Processing),
            )
            .col_expr(
                outbox_event::Column::ProcessingStartedAt,
                Expr::value(Some(now)),
            )
            .filter(outbox_event::Column::Id.is_in(ids))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        for event in &mut claimed {
            event.status = OutboxStatus::Processing;
            event.processing_started_at = Some(now);
        }

        debug!(count = claimed.len(), "Claimed outbox events");
        Ok(claimed)
    }

    async fn mark_processing(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        let update = outbox_event::Entity::update_many().col_expr(
            outbox_event::Column::ProcessingStartedAt,
            Expr::value(Some(now)),
        );
        self.advance(id, OutboxStatus::Processing, update).await
    }

    async fn mark_completed(&self, id: i64, now: DateTime<Utc>) -> Result<Transition, StoreError> {
        let update = outbox_event::Entity::update_many()
            .col_expr(outbox_event::Column::ProcessedAt, Expr::value(Some(now)));
        self.advance(id, OutboxStatus::Completed, update).await
    }

    async fn mark_retry(
        &self,
        id: i64,
        next_scheduled_at: DateTime<Utc>,
        error: &str,
    ) -> Result<Transition, StoreError> {
        let update = outbox_event::Entity::update_many()
            .col_expr(outbox_event::Column::Attempts, Expr::cust("attempts + 1"))
            .col_expr(
                outbox_event::Column::ScheduledAt,
                Expr::value(next_scheduled_at),
            )
            .col_expr(
                outbox_event::Column::LastError,
                Expr::value(Some(error.to_string())),
            );
        self.advance(id, OutboxStatus::Pending, update).await
    }

    async fn mark_dead_letter(&self, id: i64, error: &str) -> Result<Transition, StoreError> {
        let update = outbox_event::Entity::update_many()
            .col_expr(outbox_event::Column::Attempts, Expr::cust("attempts + 1"))
            .col_expr(
                outbox_event::Column::LastError,
                Expr::value(Some(error.to_string())),
            );
        self.advance(id, OutboxStatus::DeadLetter, update).await
    }

    async fn release(&self, ids: &[i64]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Pending),
            )
            .col_expr(
                outbox_event::Column::ProcessingStartedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(outbox_event::Column::Id.is_in(ids.iter().copied()))
            .filter(
                outbox_event::Column::Status.is_in(OutboxStatus::sources_of(OutboxStatus::Pending)),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    async fn count_due(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.claimable(now).count(&self.db).await?)
    }

    async fn stats(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
    ) -> Result<OutboxStats, StoreError> {
        let mut stats = OutboxStats::default();

        for status in OutboxStatus::ALL {
            let count = outbox_event::Entity::find()
                .filter(outbox_event::Column::Status.eq(*status))
                .count(&self.db)
                .await?;
            match status {
                OutboxStatus::Pending => stats.pending = count,
                OutboxStatus::Processing => stats.processing = count,
                OutboxStatus::Completed => stats.completed = count,
                OutboxStatus::DeadLetter => stats.dead_letter = count,
            }
        }

        stats.due = self.count_due(now).await?;
        stats.stuck = outbox_event::Entity::find()
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing))
            .filter(outbox_event::Column::ProcessingStartedAt.lt(stuck_before))
            .count(&self.db)
            .await?;

        Ok(stats)
    }

    async fn list_dead_letters(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<outbox_event::Model>, u64), StoreError> {
        let query = outbox_event::Entity::find()
            .filter(outbox_event::Column::Status.eq(OutboxStatus::DeadLetter));

        let total = query.clone().count(&self.db).await?;

        let events = query
            .order_by_desc(outbox_event::Column::CreatedAt)
            .order_by_desc(outbox_event::Column::Id)
            .offset(page.saturating_sub(1) * per_page)
            .limit(per_page)
            .all(&self.db)
            .await?;

        Ok((events, total))
    }
}
