// rust/wds-core/src/config.rs

//! Configuration management for the shard loader.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::{MissingComponentBehavior, OutputMap, ShardPaths};
use crate::error::{Result, WdsError};

// Top-level loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WdsConfig {
    pub dataset: DatasetConfig,
    pub sharding: ShardingConfig,
    pub storage: StorageConfig,
}

/// Which archives to read and how to assemble samples from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Archive files, paired positionally with `index_paths`.
    pub archive_paths: Vec<PathBuf>,
    /// Index files describing the archives.
    pub index_paths: Vec<PathBuf>,
    /// One extension bundle per output, alternatives separated by ';'.
    pub ext: Vec<String>,
    /// Element type name per output; every output is "uint8" when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtypes: Option<Vec<String>>,
    // "skip", "empty" or "error" (case-insensitive, "" means "empty").
    pub missing_component_behavior: String,
}

// Distributed partitioning of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingConfig {
    // Index of this reader.
    pub shard_id: u32,
    // Total number of readers.
    pub num_shards: u32,
    // Whether to wrap at the end of this reader's partition instead of the
    // end of the catalog.
    pub stick_to_shard: bool,
}

/// Archive access options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Disable memory mapping and always copy component bytes.
    pub force_copy_reads: bool,
    /// Populate mappings eagerly when archives are opened.
    pub read_ahead: bool,
    // Buffer size in bytes for copy reads.
    pub buffer_size: usize,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        Self {
            shard_id: 0,
            num_shards: 1,
            stick_to_shard: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            force_copy_reads: false,
            read_ahead: false,
            buffer_size: 64 * 1024, // 64 KB
        }
    }
}

impl DatasetConfig {
    /// Parses `missing_component_behavior`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error naming the legal values.
    pub fn missing_behavior(&self) -> Result<MissingComponentBehavior> {
        self.missing_component_behavior.parse()
    }

    /// Builds the extension-to-output map.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` or `ConfigMismatch` for invalid outputs.
    pub fn output_map(&self) -> Result<OutputMap> {
        OutputMap::new(&self.ext, self.dtypes.as_deref())
    }

    /// Pairs archives with their index files.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMismatch` if the lists are empty or differ in length.
    pub fn shard_paths(&self) -> Result<Vec<ShardPaths>> {
        if self.archive_paths.len() != self.index_paths.len() {
            return Err(WdsError::config_mismatch(format!(
                "Number of archives ({}) does not match the number of index files ({})",
                self.archive_paths.len(),
                self.index_paths.len()
            )));
        }
        if self.archive_paths.is_empty() {
            return Err(WdsError::config_mismatch("No archives provided"));
        }

        Ok(self
            .archive_paths
            .iter()
            .zip(&self.index_paths)
            .map(|(archive, index)| ShardPaths::new(archive, index))
            .collect())
    }
}

impl FromStr for WdsConfig {
    type Err = WdsError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| WdsError::config_with_source("failed to parse TOML config", e))
    }
}

impl WdsConfig {
    // Load configuration from a TOML file.
    //
    // Values are not validated here, so environment overrides can still
    // complete the file; call `validate` once they are applied.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WdsError::storage_with_source(path, "failed to read config file", e)
        })?;
        content.parse()
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `WDS_` and use underscores
    // to separate nested fields. For example:
    // - `WDS_SHARDING_SHARD_ID` overrides `sharding.shard_id`
    // - `WDS_STORAGE_FORCE_COPY_READS` overrides `storage.force_copy_reads`
    // - `WDS_DATASET_MISSING_COMPONENT_BEHAVIOR` overrides
    //   `dataset.missing_component_behavior`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Dataset overrides
        if let Ok(val) = std::env::var("WDS_DATASET_MISSING_COMPONENT_BEHAVIOR") {
            self.dataset.missing_component_behavior = val;
        }

        // Sharding overrides
        if let Ok(val) = std::env::var("WDS_SHARDING_SHARD_ID") {
            if let Ok(v) = val.parse() {
                self.sharding.shard_id = v;
            }
        }
        if let Ok(val) = std::env::var("WDS_SHARDING_NUM_SHARDS") {
            if let Ok(v) = val.parse() {
                self.sharding.num_shards = v;
            }
        }
        if let Ok(val) = std::env::var("WDS_SHARDING_STICK_TO_SHARD") {
            if let Ok(v) = val.parse() {
                self.sharding.stick_to_shard = v;
            }
        }

        // Storage overrides
        if let Ok(val) = std::env::var("WDS_STORAGE_FORCE_COPY_READS") {
            if let Ok(v) = val.parse() {
                self.storage.force_copy_reads = v;
            }
        }
        if let Ok(val) = std::env::var("WDS_STORAGE_READ_AHEAD") {
            if let Ok(v) = val.parse() {
                self.storage.read_ahead = v;
            }
        }
        if let Ok(val) = std::env::var("WDS_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Dataset validation
        self.dataset.shard_paths()?;
        self.dataset.missing_behavior()?;
        self.dataset.output_map()?;

        // Sharding validation
        if self.sharding.num_shards == 0 || self.sharding.shard_id >= self.sharding.num_shards {
            return Err(WdsError::invalid_shard(
                self.sharding.shard_id,
                self.sharding.num_shards,
            ));
        }

        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(WdsError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        Ok(())
    }
}
