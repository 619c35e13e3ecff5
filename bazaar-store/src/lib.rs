pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod order_repo;
pub mod redis_repo;
#[cfg(feature = "kafka")]
pub mod events;

pub use app_config::Config;
pub use database::DbClient;
pub use memory_repo::MemoryOrderStore;
pub use order_repo::PgOrderStore;
pub use redis_repo::RedisClient;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
