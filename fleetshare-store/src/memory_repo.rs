use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use fleetshare_core::reopen::should_reopen;
use fleetshare_core::{
    ClaimError, ClaimRepository, ClaimResult, ExpiredClaim, ExpiryOutcome, WithdrawalOutcome,
};
use fleetshare_shared::pii::Masked;
use fleetshare_shared::{ClaimStatus, RequestClaim, RequestStatus, ReservationRequest};

#[derive(Default)]
struct MemoryState {
    hosts: HashMap<Uuid, String>,
    requests: HashMap<Uuid, ReservationRequest>,
    claims: HashMap<Uuid, RequestClaim>,
    writes: usize,
}

impl MemoryState {
    fn remaining_active(&self, request_id: Uuid, excluding_claim: Option<Uuid>) -> u64 {
        self.claims
            .values()
            .filter(|c| {
                c.request_id == request_id && c.is_active() && Some(c.id) != excluding_claim
            })
            .count() as u64
    }

    fn reopen_if_vacated(
        &mut self,
        request_id: Uuid,
        excluding_claim: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> bool {
        let remaining = self.remaining_active(request_id, excluding_claim);
        let Some(request) = self.requests.get_mut(&request_id) else {
            return false;
        };
        if !should_reopen(remaining, request.status) {
            return false;
        }
        request.update_status(RequestStatus::Open, now);
        self.writes += 1;
        true
    }
}

/// Claim store held in process memory.
///
/// Every operation runs under one lock and validates before it mutates, so each
/// call is as atomic as the PostgreSQL transaction it stands in for. Used by
/// tests and by local runs without a database.
#[derive(Default)]
pub struct InMemoryClaimRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryClaimRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_host(&self, id: Uuid, name: &str) {
        self.state.lock().await.hosts.insert(id, name.to_string());
    }

    pub async fn insert_request(&self, request: ReservationRequest) {
        self.state.lock().await.requests.insert(request.id, request);
    }

    pub async fn insert_claim(&self, claim: RequestClaim) {
        self.state.lock().await.claims.insert(claim.id, claim);
    }

    pub async fn claim(&self, id: Uuid) -> Option<RequestClaim> {
        self.state.lock().await.claims.get(&id).cloned()
    }

    pub async fn request(&self, id: Uuid) -> Option<ReservationRequest> {
        self.state.lock().await.requests.get(&id).cloned()
    }

    /// Rows changed through the repository API since creation (seeding excluded).
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }
}

#[async_trait]
impl ClaimRepository for InMemoryClaimRepository {
    async fn find_expired_pending_claims(
        &self,
        now: DateTime<Utc>,
    ) -> ClaimResult<Vec<ExpiredClaim>> {
        let state = self.state.lock().await;

        let mut expired: Vec<ExpiredClaim> = state
            .claims
            .values()
            .filter(|c| c.is_lapsed(now))
            .filter_map(|c| {
                let deadline = c.claim_expires_at?;
                let host_name = state
                    .hosts
                    .get(&c.host_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown host".to_string());
                Some(ExpiredClaim {
                    claim_id: c.id,
                    request_id: c.request_id,
                    host_id: c.host_id,
                    host_name: Masked(host_name),
                    claim_expires_at: deadline,
                })
            })
            .collect();

        expired.sort_by_key(|c| c.claim_expires_at);
        Ok(expired)
    }

    async fn expire_claim(
        &self,
        claim_id: Uuid,
        now: DateTime<Utc>,
    ) -> ClaimResult<ExpiryOutcome> {
        let mut state = self.state.lock().await;

        let claim = state.claims.get(&claim_id).ok_or(ClaimError::ClaimNotFound(claim_id))?;
        let request_id = claim.request_id;

        if claim.status != ClaimStatus::PendingCar {
            return Ok(ExpiryOutcome { expired: false, request_id, reopened: false });
        }
        if !state.requests.contains_key(&request_id) {
            return Err(ClaimError::RequestNotFound(request_id));
        }

        if let Some(claim) = state.claims.get_mut(&claim_id) {
            claim.mark_expired(now);
        }
        state.writes += 1;

        let reopened = state.reopen_if_vacated(request_id, Some(claim_id), now);

        Ok(ExpiryOutcome { expired: true, request_id, reopened })
    }

    async fn list_active_claims(
        &self,
        host_id: Uuid,
    ) -> ClaimResult<Vec<RequestClaim>> {
        let state = self.state.lock().await;

        let mut claims: Vec<RequestClaim> = state
            .claims
            .values()
            .filter(|c| c.host_id == host_id && c.is_active())
            .cloned()
            .collect();

        claims.sort_by_key(|c| c.created_at);
        Ok(claims)
    }

    async fn withdraw_claims(
        &self,
        host_id: Uuid,
        claim_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> ClaimResult<WithdrawalOutcome> {
        let mut state = self.state.lock().await;

        let targets: Vec<Uuid> = claim_ids
            .iter()
            .copied()
            .filter(|id| {
                state
                    .claims
                    .get(id)
                    .map_or(false, |c| c.host_id == host_id && c.is_active())
            })
            .collect();

        // Validate everything up front so a failure leaves no partial withdrawal
        for id in &targets {
            let request_id = state.claims[id].request_id;
            if !state.requests.contains_key(&request_id) {
                return Err(ClaimError::RequestNotFound(request_id));
            }
        }

        let mut withdrawn = Vec::with_capacity(targets.len());
        let mut touched: Vec<Uuid> = Vec::new();
        for id in &targets {
            if let Some(claim) = state.claims.get_mut(id) {
                claim.mark_withdrawn(now);
                if !touched.contains(&claim.request_id) {
                    touched.push(claim.request_id);
                }
                withdrawn.push(claim.clone());
            }
        }
        state.writes += withdrawn.len();

        let reopened_requests = touched
            .into_iter()
            .filter(|request_id| state.reopen_if_vacated(*request_id, None, now))
            .collect();

        Ok(WithdrawalOutcome { withdrawn, reopened_requests })
    }
}
