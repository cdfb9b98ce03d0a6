use std::net::SocketAddr;

use anyhow::Context;
use tracing::info;

use server::channels::Channels;
use server::config::AppConfig;
use server::database::{ensure_indexes, init_db};
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    ensure_indexes(&db)
        .await
        .context("Failed to create outbox indexes")?;

    let channels = Channels::from_config(&config).context("Failed to build channel clients")?;
    info!(
        chat = channels.chat.is_some(),
        email = channels.email.is_some(),
        "Notification channels configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let app = server::build_router(AppState::from_database(config, db, channels));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Outbox service listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
