//! Loader configuration
//!
//! Persisted as pretty JSON (`slidecache.json`) in the directory chosen by
//! `paths`. Missing fields take their defaults, so old files keep loading.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::core::cache_store::{DEFAULT_ANIMATED_CAPACITY, DEFAULT_STILL_CAPACITY};
use crate::core::workers::default_worker_count;
use crate::paths::{self, PathConfig};

/// Config file name
pub const CONFIG_FILE: &str = "slidecache.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Decoded stills kept in memory
    pub still_capacity: usize,
    /// Animated sources kept in memory
    pub animated_capacity: usize,
    /// Decode threads (None = 3/4 of logical CPUs)
    pub workers: Option<usize>,
    /// Warm neighbors during navigation
    pub preload: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            still_capacity: DEFAULT_STILL_CAPACITY,
            animated_capacity: DEFAULT_ANIMATED_CAPACITY,
            workers: None,
            preload: true,
        }
    }
}

impl LoaderConfig {
    /// Bounds raised to at least 1, worker count resolved
    pub fn normalized(mut self) -> Self {
        self.still_capacity = self.still_capacity.max(1);
        self.animated_capacity = self.animated_capacity.max(1);
        self.workers = Some(self.worker_count());
        self
    }

    /// Effective decode thread count
    pub fn worker_count(&self) -> usize {
        self.workers.filter(|&n| n > 0).unwrap_or_else(default_worker_count)
    }

    /// Read a config file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config.normalized())
    }

    /// Load from the resolved config directory
    pub fn load_default(paths: &PathConfig) -> Result<Self> {
        Self::load(&paths::config_file(CONFIG_FILE, paths))
    }

    /// Write as pretty JSON, creating the directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        paths::ensure_parent(path)?;
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}
