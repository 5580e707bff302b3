pub mod models;
pub mod pii;

pub use models::claim::{ClaimStatus, RequestClaim};
pub use models::request::{RequestStatus, ReservationRequest};
pub use models::events::ClaimEvent;
pub use models::ParseStatusError;
