use std::sync::Arc;
use chrono::{DateTime, Utc};
use fleetshare_shared::{ClaimEvent, RequestClaim};
use tracing::info;
use uuid::Uuid;

use crate::{ClaimNotifier, ClaimRepository, ClaimResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalReport {
    pub cleared: usize,
    pub reopened_requests: Vec<Uuid>,
}

/// Lets a host release every claim they currently hold.
pub struct ClaimWithdrawal {
    repo: Arc<dyn ClaimRepository>,
    notifier: Arc<dyn ClaimNotifier>,
}

impl ClaimWithdrawal {
    pub fn new(repo: Arc<dyn ClaimRepository>, notifier: Arc<dyn ClaimNotifier>) -> Self {
        Self { repo, notifier }
    }

    pub async fn active_claims(&self, host_id: Uuid) -> ClaimResult<Vec<RequestClaim>> {
        self.repo.list_active_claims(host_id).await
    }

    /// Withdraw all active claims of `host_id`.
    ///
    /// A host without active claims gets an empty report and no write is issued.
    pub async fn withdraw_all(
        &self,
        host_id: Uuid,
        now: DateTime<Utc>,
    ) -> ClaimResult<WithdrawalReport> {
        let active = self.repo.list_active_claims(host_id).await?;

        if active.is_empty() {
            return Ok(WithdrawalReport::default());
        }

        let claim_ids: Vec<Uuid> = active.iter().map(|c| c.id).collect();
        let outcome = self.repo.withdraw_claims(host_id, &claim_ids, now).await?;

        for claim in &outcome.withdrawn {
            self.notifier.notify(ClaimEvent::ClaimWithdrawn {
                claim_id: claim.id,
                request_id: claim.request_id,
                host_id,
                withdrawn_at: now,
            });
        }
        for request_id in &outcome.reopened_requests {
            self.notifier.notify(ClaimEvent::RequestReopened {
                request_id: *request_id,
                reopened_at: now,
            });
        }

        info!(
            %host_id,
            cleared = outcome.withdrawn.len(),
            reopened = outcome.reopened_requests.len(),
            "Host withdrew active claims"
        );

        Ok(WithdrawalReport {
            cleared: outcome.withdrawn.len(),
            reopened_requests: outcome.reopened_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExpiredClaim, ExpiryOutcome, WithdrawalOutcome};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRepo {
        active: Vec<RequestClaim>,
        withdraw_calls: Mutex<usize>,
    }

    #[async_trait]
    impl ClaimRepository for CountingRepo {
        async fn find_expired_pending_claims(
            &self,
            _now: DateTime<Utc>,
        ) -> ClaimResult<Vec<ExpiredClaim>> {
            Ok(vec![])
        }

        async fn expire_claim(
            &self,
            claim_id: Uuid,
            _now: DateTime<Utc>,
        ) -> ClaimResult<ExpiryOutcome> {
            Err(crate::ClaimError::ClaimNotFound(claim_id))
        }

        async fn list_active_claims(&self, host_id: Uuid) -> ClaimResult<Vec<RequestClaim>> {
            Ok(self.active.iter().filter(|c| c.host_id == host_id).cloned().collect())
        }

        async fn withdraw_claims(
            &self,
            _host_id: Uuid,
            claim_ids: &[Uuid],
            now: DateTime<Utc>,
        ) -> ClaimResult<WithdrawalOutcome> {
            *self.withdraw_calls.lock().unwrap() += 1;
            let withdrawn = self
                .active
                .iter()
                .filter(|c| claim_ids.contains(&c.id))
                .cloned()
                .map(|mut c| {
                    c.mark_withdrawn(now);
                    c
                })
                .collect::<Vec<_>>();
            let reopened_requests = withdrawn.iter().map(|c| c.request_id).collect();
            Ok(WithdrawalOutcome { withdrawn, reopened_requests })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<ClaimEvent>>,
    }

    impl ClaimNotifier for RecordingNotifier {
        fn notify(&self, event: ClaimEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_no_active_claims_means_no_write() {
        let repo = Arc::new(CountingRepo::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let withdrawal = ClaimWithdrawal::new(repo.clone(), notifier.clone());

        let report = withdrawal.withdraw_all(Uuid::new_v4(), Utc::now()).await.unwrap();

        assert_eq!(report, WithdrawalReport::default());
        assert_eq!(*repo.withdraw_calls.lock().unwrap(), 0);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdraws_only_the_callers_claims() {
        let host = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = RequestClaim::pending(host, Uuid::new_v4(), Duration::minutes(30)).unwrap();
        let theirs = RequestClaim::pending(other, Uuid::new_v4(), Duration::minutes(30)).unwrap();

        let repo = Arc::new(CountingRepo {
            active: vec![mine.clone(), theirs],
            withdraw_calls: Mutex::new(0),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let withdrawal = ClaimWithdrawal::new(repo.clone(), notifier.clone());

        let report = withdrawal.withdraw_all(host, Utc::now()).await.unwrap();

        assert_eq!(report.cleared, 1);
        assert_eq!(report.reopened_requests, vec![mine.request_id]);
        assert_eq!(*repo.withdraw_calls.lock().unwrap(), 1);

        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            ClaimEvent::ClaimWithdrawn { claim_id, host_id, .. }
                if claim_id == mine.id && host_id == host
        ));
        assert!(matches!(
            events[1],
            ClaimEvent::RequestReopened { request_id, .. } if request_id == mine.request_id
        ));
    }
}
