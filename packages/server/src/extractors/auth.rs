use axum::{extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Proof that the caller presented the scheduler's shared secret, either as
/// `Authorization: Bearer <secret>` or in the `x-cron-secret` header.
///
/// Add this as a handler parameter to require it. Rejection happens before
/// the handler body runs, so an unauthenticated call never touches the store.
pub struct CronAuth;

/// Compare fixed-length digests so the comparison does not leak the secret's length.
fn secret_matches(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").ok_or(AppError::TokenInvalid))
            .transpose()?;

        let presented = match bearer {
            Some(token) => token,
            None => parts
                .headers
                .get(CRON_SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(AppError::TokenMissing)?,
        };

        let presented = presented.trim();
        if presented.is_empty() {
            return Err(AppError::TokenMissing);
        }

        let expected = state.config.auth.cron_secret.trim();
        if !expected.is_empty() && secret_matches(presented, expected) {
            Ok(CronAuth)
        } else {
            tracing::warn!("Rejected outbox trigger with invalid secret");
            Err(AppError::TokenInvalid)
        }
    }
}
