pub mod reopen;
pub mod repository;
pub mod notifier;
pub mod sweeper;
pub mod withdrawal;

use fleetshare_shared::ParseStatusError;
use uuid::Uuid;

pub use notifier::ClaimNotifier;
pub use repository::{ClaimRepository, ExpiredClaim, ExpiryOutcome, WithdrawalOutcome};
pub use sweeper::{ClaimSweeper, SweepDetail, SweepReport};
pub use withdrawal::{ClaimWithdrawal, WithdrawalReport};

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Store operation failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Corrupt row: {0}")]
    Corrupt(#[from] ParseStatusError),
    #[error("Claim not found: {0}")]
    ClaimNotFound(Uuid),
    #[error("Request not found: {0}")]
    RequestNotFound(Uuid),
}

impl ClaimError {
    /// Wrap a driver error raised by a store adapter.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ClaimError::Store(Box::new(err))
    }
}

pub type ClaimResult<T> = Result<T, ClaimError>;
