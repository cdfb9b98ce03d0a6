use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::channels::Channels;
use crate::config::AppConfig;
use crate::dispatch::{DispatchRouter, HandlerContext, PortalLinks};
use crate::enrichment::SeaOrmDirectory;
use crate::outbox::{OutboxStore, PgOutboxStore, lease_from};
use crate::processor::BatchProcessor;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn OutboxStore>,
    pub processor: Arc<BatchProcessor>,
}

impl AppState {
    /// Wire the PostgreSQL-backed store and directory to the given channels.
    pub fn from_database(config: AppConfig, db: DatabaseConnection, channels: Channels) -> Self {
        let store: Arc<dyn OutboxStore> =
            Arc::new(PgOutboxStore::new(db.clone()).with_lease(lease_from(&config.outbox)));
        let directory = Arc::new(SeaOrmDirectory::new(db));

        let router = DispatchRouter::new(HandlerContext {
            reader: directory.clone(),
            threads: directory,
            channels,
            links: PortalLinks::from(&config.portal),
        });
        let processor = BatchProcessor::new(store.clone(), Arc::new(router), config.outbox.clone());

        Self {
            config: Arc::new(config),
            store,
            processor: Arc::new(processor),
        }
    }
}
