use fleetshare_shared::ClaimEvent;

/// Fan-out point for claim lifecycle events.
///
/// Delivery is best effort: a notifier never fails the state change that
/// produced the event.
pub trait ClaimNotifier: Send + Sync {
    fn notify(&self, event: ClaimEvent);
}
