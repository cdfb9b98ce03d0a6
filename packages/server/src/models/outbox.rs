use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::outbox_event;
use crate::outbox::OutboxStats;
use crate::processor::{BatchError, BatchReport};

use super::shared::Pagination;

/// Result of one outbox processing run.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutboxResponse {
    /// `false` when the run was aborted by a store failure.
    #[schema(example = true)]
    pub success: bool,
    /// Events finalized as completed.
    #[schema(example = 4)]
    pub processed: usize,
    /// Events that failed this run (requeued or dead-lettered).
    #[schema(example = 1)]
    pub errors: usize,
    /// Claimable events left after the run.
    #[schema(example = 0)]
    pub unprocessed: u64,
    #[schema(example = json!([12, 13, 15, 16]))]
    pub processed_ids: Vec<i64>,
    #[schema(example = "Processed 4 events, 1 failed, 0 remaining")]
    pub message: String,
}

impl From<BatchReport> for ProcessOutboxResponse {
    fn from(report: BatchReport) -> Self {
        let message = format!(
            "Processed {} events, {} failed, {} remaining",
            report.processed(),
            report.errors(),
            report.remaining
        );
        Self {
            success: true,
            processed: report.processed(),
            errors: report.errors(),
            unprocessed: report.remaining,
            processed_ids: report.processed_ids,
            message,
        }
    }
}

impl From<BatchError> for ProcessOutboxResponse {
    fn from(err: BatchError) -> Self {
        let partial = err.partial;
        Self {
            success: false,
            processed: partial.processed(),
            errors: partial.errors(),
            unprocessed: 0,
            message: format!(
                "Outbox store unavailable; run aborted after {} events",
                partial.processed()
            ),
            processed_ids: partial.processed_ids,
        }
    }
}

impl ProcessOutboxResponse {
    /// The run ended without a report, e.g. its task panicked.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            processed: 0,
            errors: 0,
            unprocessed: 0,
            processed_ids: Vec::new(),
            message: message.into(),
        }
    }
}

/// Outbox status counts.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutboxStatsResponse {
    #[schema(example = 3)]
    pub pending: u64,
    #[schema(example = 0)]
    pub processing: u64,
    #[schema(example = 120)]
    pub completed: u64,
    #[schema(example = 2)]
    pub dead_letter: u64,
    /// Pending events eligible for claiming now.
    #[schema(example = 1)]
    pub due: u64,
    /// Processing events older than the stuck threshold.
    #[schema(example = 0)]
    pub stuck: u64,
}

impl From<OutboxStats> for OutboxStatsResponse {
    fn from(s: OutboxStats) -> Self {
        Self {
            pending: s.pending,
            processing: s.processing,
            completed: s.completed,
            dead_letter: s.dead_letter,
            due: s.due,
            stuck: s.stuck,
        }
    }
}

/// Query parameters for listing dead-lettered events.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDeadLettersParams {
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

/// A dead-lettered event, kept for manual inspection.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterResponse {
    #[schema(example = 42)]
    pub id: i64,
    #[schema(example = "ticket.status_updated")]
    pub event_type: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    #[schema(example = 3)]
    pub attempts: i32,
    #[schema(example = 3)]
    pub max_attempts: i32,
    #[schema(example = "delivery failed: HTTP request failed: connection refused")]
    pub last_error: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    #[schema(example = "2025-09-01T08:00:00Z")]
    pub created_at: DateTime<Utc>,
}

impl From<outbox_event::Model> for DeadLetterResponse {
    fn from(m: outbox_event::Model) -> Self {
        Self {
            id: m.id,
            event_type: m.event_type,
            payload: m.payload,
            attempts: m.attempts,
            max_attempts: m.max_attempts,
            last_error: m.last_error,
            processing_started_at: m.processing_started_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeadLetterListResponse {
    pub data: Vec<DeadLetterResponse>,
    pub pagination: Pagination,
}
