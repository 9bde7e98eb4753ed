pub mod config;
pub mod types;

pub use config::{AdminAccess, ConfigError, PoolConfig};
pub use types::*;
