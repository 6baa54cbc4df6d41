pub mod app_config;
pub mod catalog;
pub mod database;
pub mod events;
pub mod ledger;
pub mod lease;

pub use catalog::PgCatalog;
pub use database::DbClient;
pub use events::KafkaNotifier;
pub use ledger::PgLedger;
pub use lease::RedisLeaseStore;
