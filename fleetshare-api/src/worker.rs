use std::sync::Arc;
use chrono::Utc;
use fleetshare_core::ClaimSweeper;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, error};

/// Run the claim sweeper every `interval_seconds` inside this process.
///
/// Returns `None` (and starts nothing) for an interval of zero, leaving sweeps
/// to the external scheduler calling the cron endpoint.
pub fn start_sweep_worker(
    sweeper: Arc<ClaimSweeper>,
    interval_seconds: u64,
) -> Option<JoinHandle<()>> {
    if interval_seconds == 0 {
        info!("In-process claim sweeper disabled");
        return None;
    }

    info!("Claim sweep worker started, running every {}s", interval_seconds);

    Some(tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match sweeper.sweep(Utc::now()).await {
                Ok(report) if report.is_empty() => {}
                Ok(report) => info!(
                    processed = report.processed,
                    failed = report.failed,
                    "Background claim sweep finished"
                ),
                Err(e) => error!("Background claim sweep failed: {}", e),
            }
        }
    }))
}
