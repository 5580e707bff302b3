use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetshare_shared::pii::Masked;
use fleetshare_shared::RequestClaim;
use uuid::Uuid;

use crate::ClaimResult;

/// A lapsed `PENDING_CAR` claim selected by the sweeper, joined with its host.
#[derive(Debug, Clone)]
pub struct ExpiredClaim {
    pub claim_id: Uuid,
    pub request_id: Uuid,
    pub host_id: Uuid,
    pub host_name: Masked<String>,
    pub claim_expires_at: DateTime<Utc>,
}

/// Result of expiring one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryOutcome {
    /// `false` when the claim had already left `PENDING_CAR` (settled by a
    /// concurrent sweep or host action) and nothing was written.
    pub expired: bool,
    pub request_id: Uuid,
    pub reopened: bool,
}

/// Result of a host's bulk withdrawal.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalOutcome {
    pub withdrawn: Vec<RequestClaim>,
    pub reopened_requests: Vec<Uuid>,
}

/// Transactional access to claims and the requests they hold.
///
/// Implementations must run each of `expire_claim` and `withdraw_claims` as a
/// single atomic unit and must decide request reopening with
/// [`crate::reopen::should_reopen`].
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// Every `PENDING_CAR` claim whose `claim_expires_at` is strictly before `now`.
    async fn find_expired_pending_claims(
        &self,
        now: DateTime<Utc>,
    ) -> ClaimResult<Vec<ExpiredClaim>>;

    /// Expire one claim and reopen its request if it was the last active claim.
    async fn expire_claim(
        &self,
        claim_id: Uuid,
        now: DateTime<Utc>,
    ) -> ClaimResult<ExpiryOutcome>;

    /// Claims owned by `host_id` in `PENDING_CAR` or `CAR_SELECTED`.
    async fn list_active_claims(
        &self,
        host_id: Uuid,
    ) -> ClaimResult<Vec<RequestClaim>>;

    /// Withdraw the given claims of `host_id` that are still active, then
    /// reopen every touched request left without active claims.
    async fn withdraw_claims(
        &self,
        host_id: Uuid,
        claim_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> ClaimResult<WithdrawalOutcome>;
}
