use std::sync::Arc;
use chrono::{DateTime, Utc};
use fleetshare_shared::pii::Masked;
use fleetshare_shared::ClaimEvent;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{ClaimNotifier, ClaimRepository, ClaimResult};

/// Per-claim line of a sweep report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepDetail {
    pub claim_id: Uuid,
    pub request_id: Uuid,
    pub host_name: Masked<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub failed: usize,
    pub details: Vec<SweepDetail>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn message(&self) -> String {
        if self.is_empty() {
            "No expired claims to process".to_string()
        } else {
            format!("Processed {} expired claims", self.processed)
        }
    }
}

/// Lapses `PENDING_CAR` claims whose deadline passed and reopens the requests
/// they were holding.
pub struct ClaimSweeper {
    repo: Arc<dyn ClaimRepository>,
    notifier: Arc<dyn ClaimNotifier>,
}

impl ClaimSweeper {
    pub fn new(repo: Arc<dyn ClaimRepository>, notifier: Arc<dyn ClaimNotifier>) -> Self {
        Self { repo, notifier }
    }

    /// Run one sweep as of `now`.
    ///
    /// Only the candidate lookup can fail the sweep as a whole. Each claim is
    /// expired in its own transaction and failures are recorded in the report.
    pub async fn sweep(&self, now: DateTime<Utc>) -> ClaimResult<SweepReport> {
        let candidates = self.repo.find_expired_pending_claims(now).await?;

        if candidates.is_empty() {
            info!("No expired claims to process");
            return Ok(SweepReport::default());
        }

        info!(count = candidates.len(), "Processing expired claims");

        let mut report = SweepReport::default();

        for claim in candidates {
            match self.repo.expire_claim(claim.claim_id, now).await {
                Ok(outcome) => {
                    if outcome.expired {
                        self.notifier.notify(ClaimEvent::ClaimExpired {
                            claim_id: claim.claim_id,
                            request_id: claim.request_id,
                            host_id: claim.host_id,
                            expired_at: now,
                        });
                    }
                    if outcome.reopened {
                        info!(
                            request_id = %outcome.request_id,
                            "Request reopened after claim expiry"
                        );
                        self.notifier.notify(ClaimEvent::RequestReopened {
                            request_id: outcome.request_id,
                            reopened_at: now,
                        });
                    }

                    report.processed += 1;
                    report.details.push(SweepDetail {
                        claim_id: claim.claim_id,
                        request_id: claim.request_id,
                        host_name: claim.host_name,
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(
                        claim_id = %claim.claim_id,
                        host = %claim.host_name,
                        error = %e,
                        "Failed to expire claim"
                    );

                    report.failed += 1;
                    report.details.push(SweepDetail {
                        claim_id: claim.claim_id,
                        request_id: claim.request_id,
                        host_name: claim.host_name,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(processed = report.processed, failed = report.failed, "Claim sweep finished");
        Ok(report)
    }
}
