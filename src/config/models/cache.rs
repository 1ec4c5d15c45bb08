//! Counter cache policy configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Policy knobs for counter keys, TTLs and the local over-limit cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Prefix prepended to every counter key (shared-store tenancy)
    #[serde(default)]
    pub cache_key_prefix: String,
    /// Upper bound of uniform jitter added to counter TTLs; 0 disables
    #[serde(default)]
    pub expiration_jitter_max_seconds: i64,
    /// Ratio of the limit at which a key counts as "near limit"
    #[serde(default = "default_near_limit_ratio")]
    pub near_limit_ratio: f32,
    /// Enables the pre-read and selective-increment policy
    #[serde(default)]
    pub stop_cache_key_increment_when_overlimit: bool,
    /// Byte budget for the local over-limit cache; 0 disables
    #[serde(default)]
    pub local_cache_size_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_key_prefix: String::new(),
            expiration_jitter_max_seconds: 0,
            near_limit_ratio: default_near_limit_ratio(),
            stop_cache_key_increment_when_overlimit: false,
            local_cache_size_bytes: 0,
        }
    }
}

impl CacheSettings {
    /// Validate the cache policy
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if !(self.near_limit_ratio > 0.0 && self.near_limit_ratio <= 1.0) {
            return Err(crate::utils::error::Error::Config(format!(
                "near_limit_ratio must be in (0, 1], got {}",
                self.near_limit_ratio
            )));
        }
        if self.expiration_jitter_max_seconds < 0 {
            return Err(crate::utils::error::Error::Config(
                "expiration_jitter_max_seconds must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
