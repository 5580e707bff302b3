use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

use super::ParseStatusError;

/// Claim status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    PendingCar,
    CarSelected,
    Expired,
    Withdrawn,
    Completed,
}

impl ClaimStatus {
    /// Statuses that hold a request away from `OPEN`.
    pub const ACTIVE: [ClaimStatus; 2] = [ClaimStatus::PendingCar, ClaimStatus::CarSelected];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::PendingCar => "PENDING_CAR",
            ClaimStatus::CarSelected => "CAR_SELECTED",
            ClaimStatus::Expired => "EXPIRED",
            ClaimStatus::Withdrawn => "WITHDRAWN",
            ClaimStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_active(&self) -> bool {
        ClaimStatus::ACTIVE.contains(self)
    }

    /// PENDING_CAR → {CAR_SELECTED, EXPIRED, WITHDRAWN}
    /// CAR_SELECTED → {EXPIRED, WITHDRAWN, COMPLETED}
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (PendingCar, CarSelected)
                | (PendingCar, Expired)
                | (PendingCar, Withdrawn)
                | (CarSelected, Expired)
                | (CarSelected, Withdrawn)
                | (CarSelected, Completed)
        )
    }

    pub fn active_strs() -> [&'static str; 2] {
        ClaimStatus::ACTIVE.map(|s| s.as_str())
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_CAR" => Ok(ClaimStatus::PendingCar),
            "CAR_SELECTED" => Ok(ClaimStatus::CarSelected),
            "EXPIRED" => Ok(ClaimStatus::Expired),
            "WITHDRAWN" => Ok(ClaimStatus::Withdrawn),
            "COMPLETED" => Ok(ClaimStatus::Completed),
            other => Err(ParseStatusError {
                kind: "claim",
                value: other.to_string(),
            }),
        }
    }
}

/// A host's time-boxed, exclusive intent to fulfil a reservation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestClaim {
    pub id: Uuid,
    pub host_id: Uuid,
    pub request_id: Uuid,
    pub status: ClaimStatus,
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestClaim {
    /// Open a new `PENDING_CAR` claim whose deadline is `window` from now.
    ///
    /// Returns `None` for a non-positive window: a pending claim must always
    /// start with a deadline in the future.
    pub fn pending(host_id: Uuid, request_id: Uuid, window: Duration) -> Option<Self> {
        if window <= Duration::zero() {
            return None;
        }
        let now = Utc::now();
        Some(Self {
            id: Uuid::new_v4(),
            host_id,
            request_id,
            status: ClaimStatus::PendingCar,
            claim_expires_at: Some(now + window),
            expired_at: None,
            withdrawn_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// A pending claim whose deadline passed strictly before `now`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == ClaimStatus::PendingCar
            && self.claim_expires_at.map_or(false, |deadline| deadline < now)
    }

    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(ClaimStatus::Expired) {
            return false;
        }
        self.status = ClaimStatus::Expired;
        self.expired_at = Some(now);
        self.updated_at = now;
        true
    }

    pub fn mark_withdrawn(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(ClaimStatus::Withdrawn) {
            return false;
        }
        self.status = ClaimStatus::Withdrawn;
        self.withdrawn_at = Some(now);
        self.updated_at = now;
        true
    }
}
