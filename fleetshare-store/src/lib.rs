pub mod app_config;
pub mod database;
pub mod claim_repo;
pub mod memory_repo;
pub mod events;

pub use database::DbClient;
pub use claim_repo::PgClaimRepository;
pub use memory_repo::InMemoryClaimRepository;
pub use events::BroadcastNotifier;
