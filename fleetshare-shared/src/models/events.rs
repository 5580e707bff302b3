use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Claim lifecycle notifications fanned out to interested hosts.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaimEvent {
    ClaimExpired {
        claim_id: Uuid,
        request_id: Uuid,
        host_id: Uuid,
        expired_at: DateTime<Utc>,
    },
    ClaimWithdrawn {
        claim_id: Uuid,
        request_id: Uuid,
        host_id: Uuid,
        withdrawn_at: DateTime<Utc>,
    },
    RequestReopened {
        request_id: Uuid,
        reopened_at: DateTime<Utc>,
    },
}

impl ClaimEvent {
    /// Host the event concerns, if it is addressed to one.
    pub fn host_id(&self) -> Option<Uuid> {
        match self {
            ClaimEvent::ClaimExpired { host_id, .. }
            | ClaimEvent::ClaimWithdrawn { host_id, .. } => Some(*host_id),
            ClaimEvent::RequestReopened { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClaimEvent::ClaimExpired { .. } => "claim_expired",
            ClaimEvent::ClaimWithdrawn { .. } => "claim_withdrawn",
            ClaimEvent::RequestReopened { .. } => "request_reopened",
        }
    }
}
