//! The single rule deciding whether a reservation request goes back to `OPEN`
//! after one of its claims leaves the active set.
//!
//! Every store adapter calls [`should_reopen`] from both the expiry and the
//! withdrawal paths, and restricts the resulting write to
//! [`REOPENABLE_STATUSES`] so a request that moved on concurrently is left alone.

use fleetshare_shared::RequestStatus;

/// Request statuses the rule is allowed to reset.
pub const REOPENABLE_STATUSES: [RequestStatus; 2] =
    [RequestStatus::Claimed, RequestStatus::CarAssigned];

/// `remaining_active == 0 && status ∈ {CLAIMED, CAR_ASSIGNED}`
pub fn should_reopen(remaining_active: u64, status: RequestStatus) -> bool {
    remaining_active == 0 && status.is_reopenable()
}

/// Stored string forms of [`REOPENABLE_STATUSES`], for conditional updates.
pub fn reopenable_strs() -> Vec<&'static str> {
    REOPENABLE_STATUSES.iter().map(|s| s.as_str()).collect()
}
