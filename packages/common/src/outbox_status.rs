#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an outbox event.
///
/// Events only move forward: `Pending -> Processing -> {Completed | Pending | DeadLetter}`.
/// `Completed` and `DeadLetter` are terminal.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Waiting to be claimed once `scheduled_at` has passed.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Claimed by an invocation and currently being dispatched.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "processing"))]
    Processing,
    /// Delivered (or deliberately skipped).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "completed"))]
    Completed,
    /// Retry budget exhausted. Kept for inspection, never retried.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "dead_letter"))]
    DeadLetter,
}

impl OutboxStatus {
    /// All possible status values.
    pub const ALL: &'static [OutboxStatus] = &[
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::DeadLetter,
    ];

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `Processing -> Processing` re-stamps the claim and extends its lease.
    pub fn can_transition_to(&self, next: OutboxStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Pending)
                | (Self::Processing, Self::DeadLetter)
        )
    }

    /// Statuses a row may be in for a move to `next` to apply.
    pub fn sources_of(next: OutboxStatus) -> Vec<OutboxStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(next))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for OutboxStatus {
    fn default() -> Self {
        Self::Pending
    }
}
