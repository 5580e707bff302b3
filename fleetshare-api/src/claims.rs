use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::AppError, middleware::HostIdentity, state::AppState};
use fleetshare_shared::{ClaimStatus, RequestClaim};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ClearClaimsResponse {
    pub success: bool,
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub status: ClaimStatus,
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<RequestClaim> for ClaimResponse {
    fn from(claim: RequestClaim) -> Self {
        Self {
            id: claim.id,
            request_id: claim.request_id,
            status: claim.status,
            claim_expires_at: claim.claim_expires_at,
            created_at: claim.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActiveClaimsResponse {
    pub claims: Vec<ClaimResponse>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/host/claims",
            get(list_active_claims).delete(clear_claims),
        )
        .route("/api/host/claims/events", get(claim_events))
}

// ============================================================================
// Handlers
// ============================================================================

/// DELETE /api/host/claims
/// Withdraw every active claim of the calling host
async fn clear_claims(
    State(state): State<AppState>,
    identity: HostIdentity,
) -> Result<Json<ClearClaimsResponse>, AppError> {
    let report = state
        .withdrawal
        .withdraw_all(identity.host_id, Utc::now())
        .await
        .map_err(|e| AppError::OperationFailed("Failed to clear claims", e.into()))?;

    Ok(Json(ClearClaimsResponse {
        success: true,
        cleared: report.cleared,
    }))
}

/// GET /api/host/claims
async fn list_active_claims(
    State(state): State<AppState>,
    identity: HostIdentity,
) -> Result<Json<ActiveClaimsResponse>, AppError> {
    let claims = state
        .withdrawal
        .active_claims(identity.host_id)
        .await
        .map_err(|e| AppError::OperationFailed("Failed to load claims", e.into()))?;

    Ok(Json(ActiveClaimsResponse {
        claims: claims.into_iter().map(ClaimResponse::from).collect(),
    }))
}

/// GET /api/host/claims/events
/// Live stream of the calling host's claim expiries and withdrawals
async fn claim_events(
    State(state): State<AppState>,
    identity: HostIdentity,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let host_id = identity.host_id;
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.host_id() == Some(host_id) => Event::default()
                .event(event.name())
                .json_data(&event)
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(%host_id, "Claim event stream lagged: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
