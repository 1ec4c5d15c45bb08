//! Error handling for the rate limiter
//!
//! This module defines all error types produced by the limiter core.

use thiserror::Error;

/// Result type alias for the rate limiter
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the rate limiter
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Redis errors
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Store errors that must fan out to multiple waiters
    #[error("Store error: {0}")]
    Store(String),

    /// Connection pool exhausted and configured to fail fast
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// Store operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Request was cancelled before completion
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Internal invariant violations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Clone-able rendition of any error, for delivery to multiple batch waiters.
    pub fn shared(&self) -> Error {
        Error::Store(self.to_string())
    }
}
