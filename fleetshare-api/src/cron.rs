use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use fleetshare_core::SweepDetail;
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub success: bool,
    pub message: String,
    pub processed: usize,
    pub failed: usize,
    pub details: Vec<SweepDetail>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/cron/expire-claims", get(expire_claims).post(expire_claims))
}

/// Without a configured secret the endpoint is open; with one, the caller must
/// present exactly `Bearer <secret>`.
fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), AppError> {
    let Some(secret) = secret else {
        return Ok(());
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == secret => Ok(()),
        _ => {
            tracing::warn!("Rejected claim sweep call with missing or wrong cron secret");
            Err(AppError::unauthorized())
        }
    }
}

/// GET|POST /api/cron/expire-claims
/// Expire lapsed PENDING_CAR claims and reopen the requests they held
async fn expire_claims(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, AppError> {
    authorize(&headers, state.cron_secret.as_deref())?;

    let report = state
        .sweeper
        .sweep(Utc::now())
        .await
        .map_err(|e| AppError::OperationFailed("Failed to process expired claims", e.into()))?;

    Ok(Json(SweepResponse {
        success: true,
        message: report.message(),
        processed: report.processed,
        failed: report.failed,
        details: report.details,
    }))
}
