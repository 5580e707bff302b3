use std::sync::Arc;

use fleetshare_core::{ClaimRepository, ClaimSweeper, ClaimWithdrawal};
use fleetshare_store::BroadcastNotifier;

use crate::middleware::credentials::CredentialResolver;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub cookie_names: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub sweeper: Arc<ClaimSweeper>,
    pub withdrawal: Arc<ClaimWithdrawal>,
    pub events: BroadcastNotifier,
    pub credentials: Arc<CredentialResolver>,
    pub auth: AuthConfig,
    pub cron_secret: Option<String>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn ClaimRepository>,
        events: BroadcastNotifier,
        auth: AuthConfig,
        cron_secret: Option<String>,
    ) -> Self {
        let notifier = Arc::new(events.clone());
        Self {
            sweeper: Arc::new(ClaimSweeper::new(repo.clone(), notifier.clone())),
            withdrawal: Arc::new(ClaimWithdrawal::new(repo, notifier)),
            events,
            credentials: Arc::new(CredentialResolver::from_config(&auth)),
            auth,
            cron_secret: cron_secret.filter(|s| !s.is_empty()),
        }
    }
}
