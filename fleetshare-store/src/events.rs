use tokio::sync::broadcast;
use tracing::{debug, info};

use fleetshare_core::ClaimNotifier;
use fleetshare_shared::ClaimEvent;

/// Publishes claim events on an in-process broadcast channel.
///
/// Subscribers (the host event stream) each get their own receiver; a receiver
/// that lags more than the channel capacity loses the oldest events.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ClaimEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClaimEvent> {
        self.tx.subscribe()
    }
}

impl ClaimNotifier for BroadcastNotifier {
    fn notify(&self, event: ClaimEvent) {
        info!(event = event.name(), host_id = ?event.host_id(), "Publishing claim event");
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for claim event: {:?}", e.0.name());
        }
    }
}
