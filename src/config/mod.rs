//! Configuration management for the rate limiter
//!
//! This module handles loading and validation of limiter configuration.
//! Rate-limit rules themselves are resolved by the embedding service and
//! arrive with each request; only the store and policy surface lives here.

pub mod models;

pub use models::*;

use crate::utils::error::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the rate limiter
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    /// Main counter store
    #[serde(default)]
    pub store: StoreConfig,
    /// Optional dedicated store for SECOND-unit rules
    #[serde(default)]
    pub per_second_store: Option<StoreConfig>,
    /// Counter key and local cache policy
    #[serde(default)]
    pub cache: CacheSettings,
    /// Hot-key detection and batching
    #[serde(default)]
    pub hot_key: HotKeyConfig,
}

impl Settings {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        settings.validate()?;

        debug!("Configuration loaded successfully");
        Ok(settings)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        if let Some(ref per_second) = self.per_second_store {
            per_second.validate()?;
        }
        self.cache.validate()?;
        self.hot_key.validate()?;
        Ok(())
    }
}
