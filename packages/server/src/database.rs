use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::entity::{outbox_event, ticket_thread};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Create indexes the schema sync does not derive from the entities.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Claim query:
    // WHERE status = 'pending' AND scheduled_at <= ? ORDER BY priority, created_at
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_outbox_event_claim")
        .table(outbox_event::Entity)
        .col(outbox_event::Column::Status)
        .col(outbox_event::Column::Priority)
        .col(outbox_event::Column::CreatedAt)
        .col(outbox_event::Column::ScheduledAt)
        .to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => info!("Ensured index idx_outbox_event_claim exists"),
        Err(e) => warn!("Failed to create index idx_outbox_event_claim: {}", e),
    }

    // One thread root per (ticket, channel, target); first writer wins.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_ticket_thread_target")
        .table(ticket_thread::Entity)
        .col(ticket_thread::Column::TicketId)
        .col(ticket_thread::Column::Channel)
        .col(ticket_thread::Column::Target)
        .to_string(PostgresQueryBuilder);

    db.execute_unprepared(&stmt).await?;
    info!("Ensured index idx_ticket_thread_target exists");

    Ok(())
}
