//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot add more nodes to pool [requested: {requested}, current: {current}, max: {max}]")]
    CapacityExceeded { requested: u32, current: u32, max: u32 },

    #[error("backend could not provision nodes [requested: {requested}, created: {created}]")]
    ProvisioningFailed { requested: u32, created: u32 },

    #[error("node not assigned: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("pool invariant violated: {0}")]
    InvariantViolation(String),

    #[error("config error: {0}")]
    Config(#[from] nodepool_core::ConfigError),

    #[error("metadata store error: {0}")]
    Store(#[from] nodepool_state::StateError),

    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type PoolResult<T> = Result<T, PoolError>;
