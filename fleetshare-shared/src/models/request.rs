use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::ParseStatusError;

/// Reservation request status.
///
/// Only `Open`, `Claimed` and `CarAssigned` are driven by the claim workflow;
/// the remaining variants are carried through untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    Claimed,
    CarAssigned,
    Booked,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "OPEN",
            RequestStatus::Claimed => "CLAIMED",
            RequestStatus::CarAssigned => "CAR_ASSIGNED",
            RequestStatus::Booked => "BOOKED",
            RequestStatus::Cancelled => "CANCELLED",
            RequestStatus::Expired => "EXPIRED",
        }
    }

    /// Statuses a request may be returned to `Open` from once its claims vacate.
    pub fn is_reopenable(&self) -> bool {
        matches!(self, RequestStatus::Claimed | RequestStatus::CarAssigned)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(RequestStatus::Open),
            "CLAIMED" => Ok(RequestStatus::Claimed),
            "CAR_ASSIGNED" => Ok(RequestStatus::CarAssigned),
            "BOOKED" => Ok(RequestStatus::Booked),
            "CANCELLED" => Ok(RequestStatus::Cancelled),
            "EXPIRED" => Ok(RequestStatus::Expired),
            other => Err(ParseStatusError {
                kind: "request",
                value: other.to_string(),
            }),
        }
    }
}

/// A guest's open call for a host to supply a matching vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub id: Uuid,
    pub status: RequestStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationRequest {
    pub fn new(status: RequestStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, status: RequestStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}
