//! Actor Configuration
//!
//! Tunables for the per-vault index actor. Loaded from TOML, every field
//! optional with defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::{AppError, AppResult};

/// Configuration for [`super::VaultIndexActor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexActorConfig {
    /// Maximum number of paths per `remove_paths`/`upsert_paths` executor call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Quiet window a scheduled drain waits for before it snapshots its
    /// queue. Zero settles across scheduler yields only.
    #[serde(default = "default_coalesce_delay_ms")]
    pub coalesce_delay_ms: u64,
}

fn default_batch_size() -> usize {
    200
}

fn default_coalesce_delay_ms() -> u64 {
    5
}

impl Default for IndexActorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            coalesce_delay_ms: default_coalesce_delay_ms(),
        }
    }
}

impl IndexActorConfig {
    /// Set the executor batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the coalescing delay.
    pub fn with_coalesce_delay(mut self, delay: Duration) -> Self {
        self.coalesce_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }

    /// Reject values the drain loop cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(AppError::config("batchSize must be greater than zero"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load_from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
