use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::{error, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::CronAuth;
use crate::models::outbox::*;
use crate::models::shared::Pagination;
use crate::outbox::lease_from;
use crate::state::AppState;

/// Runs on its own task so a caller hanging up does not abandon a half-done batch.
async fn run_processor(state: &AppState) -> (StatusCode, Json<ProcessOutboxResponse>) {
    let processor = state.processor.clone();
    match tokio::spawn(async move { processor.run().await }).await {
        Ok(Ok(report)) => (StatusCode::OK, Json(report.into())),
        Ok(Err(err)) => (StatusCode::SERVICE_UNAVAILABLE, Json(err.into())),
        Err(join_err) => {
            error!(error = %join_err, "Outbox run task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProcessOutboxResponse::failed("Outbox run failed")),
            )
        }
    }
}

/// Process due outbox events.
#[utoipa::path(
    post,
    path = "/process",
    tag = "Outbox",
    operation_id = "processOutbox",
    summary = "Run one outbox processing cycle",
    description = "Claims due pending events in priority order, dispatches them and records \
        completion, retry or dead-letter. Bounded by the configured per-run cap. \
        Authenticated with the cron secret as a bearer token or `x-cron-secret` header.",
    responses(
        (status = 200, description = "Run completed", body = ProcessOutboxResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Run aborted by a store failure", body = ProcessOutboxResponse),
        (status = 500, description = "Run task failed", body = ProcessOutboxResponse),
    ),
    security(("cron_secret" = [])),
)]
#[instrument(skip_all)]
pub async fn process_outbox(
    _auth: CronAuth,
    State(state): State<AppState>,
) -> (StatusCode, Json<ProcessOutboxResponse>) {
    run_processor(&state).await
}

/// Process due outbox events (GET variant for schedulers that only issue GET).
#[utoipa::path(
    get,
    path = "/process",
    tag = "Outbox",
    operation_id = "processOutboxGet",
    summary = "Run one outbox processing cycle (GET)",
    responses(
        (status = 200, description = "Run completed", body = ProcessOutboxResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Run aborted by a store failure", body = ProcessOutboxResponse),
        (status = 500, description = "Run task failed", body = ProcessOutboxResponse),
    ),
    security(("cron_secret" = [])),
)]
#[instrument(skip_all)]
pub async fn process_outbox_get(
    _auth: CronAuth,
    State(state): State<AppState>,
) -> (StatusCode, Json<ProcessOutboxResponse>) {
    run_processor(&state).await
}

/// Get outbox statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Outbox",
    operation_id = "getOutboxStats",
    summary = "Get outbox status counts",
    description = "Counts per status, due pending events, and processing events older than \
        the stuck threshold.",
    responses(
        (status = 200, description = "Outbox statistics", body = OutboxStatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Store unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("cron_secret" = [])),
)]
#[instrument(skip_all)]
pub async fn get_outbox_stats(
    _auth: CronAuth,
    State(state): State<AppState>,
) -> Result<Json<OutboxStatsResponse>, AppError> {
    let now = Utc::now();
    let stuck_before = now - lease_from(&state.config.outbox);

    let stats = state.store.stats(now, stuck_before).await?;
    Ok(Json(stats.into()))
}

/// List dead-lettered events.
#[utoipa::path(
    get,
    path = "/dead-letters",
    tag = "Outbox",
    operation_id = "listDeadLetters",
    summary = "List dead-lettered events",
    description = "Returns a paginated list of events that exhausted their retry budget, newest first.",
    params(ListDeadLettersParams),
    responses(
        (status = 200, description = "List of dead-lettered events", body = DeadLetterListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 503, description = "Store unavailable (SERVICE_UNAVAILABLE)", body = ErrorBody),
    ),
    security(("cron_secret" = [])),
)]
#[instrument(skip(state, _auth))]
pub async fn list_dead_letters(
    _auth: CronAuth,
    State(state): State<AppState>,
    Query(params): Query<ListDeadLettersParams>,
) -> Result<Json<DeadLetterListResponse>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);

    let (events, total) = state.store.list_dead_letters(page, per_page).await?;

    Ok(Json(DeadLetterListResponse {
        data: events.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}
