use utoipa_axum::{router::OpenApiRouter, routes};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/outbox", outbox_routes())
}

fn outbox_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::outbox::process_outbox,
            handlers::outbox::process_outbox_get
        ))
        .routes(routes!(handlers::outbox::get_outbox_stats))
        .routes(routes!(handlers::outbox::list_dead_letters))
}
