pub mod app_config;
pub mod backend_client;
pub mod memory;
pub mod redis_repo;

pub use app_config::Config;
pub use backend_client::HttpBookingBackend;
pub use memory::MemorySessionStore;
pub use redis_repo::RedisSessionStore;
