//! Counter store configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Behaviour when a connection is requested and the pool is empty
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolOnEmpty {
    /// Open a transient connection outside the pool
    Create,
    /// Fail the request immediately
    Error,
    /// Block until a connection frees up, bounded by the wait duration
    #[default]
    Wait,
}

/// Configuration for one counter store (a Redis endpoint or cluster)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL (redis://host:port)
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Whether the endpoint is a sharded cluster
    #[serde(default)]
    pub cluster: bool,
    /// Connections held per endpoint
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// What to do when the pool is empty
    #[serde(default)]
    pub pool_on_empty: PoolOnEmpty,
    /// Cap on blocking when `pool_on_empty` is `wait`, in milliseconds
    #[serde(default = "default_pool_wait_ms")]
    pub pool_on_empty_wait_ms: u64,
    /// Deadline for a single pipeline round-trip, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            cluster: false,
            pool_size: default_pool_size(),
            pool_on_empty: PoolOnEmpty::default(),
            pool_on_empty_wait_ms: default_pool_wait_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.url.is_empty() {
            return Err(crate::utils::error::Error::Config(
                "store url must not be empty".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(crate::utils::error::Error::Config(
                "store pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
