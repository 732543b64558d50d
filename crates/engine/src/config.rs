//! Store configuration via `planb.toml`
//!
//! On first open, a default `planb.toml` is created in the data directory.
//! To change settings, edit the file and reopen the store.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use planb_core::{Error, HashLength, Result};
use planb_storage::EnvSettings;

/// Config file name placed in the store data directory.
pub const CONFIG_FILE_NAME: &str = "planb.toml";

const MIN_STORE_SIZE: u64 = 1 << 20;

/// Background maintenance settings, the `[maintenance]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Run dictionary sweeps periodically
    #[serde(default)]
    pub enabled: bool,
    /// Milliseconds between sweep passes (default: 600000)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    600_000
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_interval_ms(),
        }
    }
}

impl MaintenanceConfig {
    /// Sweep interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Store configuration loaded from `planb.toml`.
///
/// # Example
///
/// ```toml
/// max_store_size = 1073741824
/// hash_length = "long"
///
/// [maintenance]
/// enabled = true
/// interval_ms = 600000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanBConfig {
    /// Maximum size in bytes of each shape's memory map.
    #[serde(default = "default_max_store_size")]
    pub max_store_size: u64,
    /// Maximum concurrent read transactions per shape.
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
    /// Commit bulk writes after this many changes (0 = one transaction).
    #[serde(default = "default_max_puts_before_commit")]
    pub max_puts_before_commit: usize,
    /// Dictionary hash width: `"long"` (8 bytes) or `"integer"` (4 bytes).
    #[serde(default)]
    pub hash_length: HashLength,
    /// Encoded values longer than this go to the dictionary.
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold: usize,
    /// Background maintenance.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

fn default_max_store_size() -> u64 {
    1 << 30
}

fn default_max_readers() -> u32 {
    126
}

fn default_max_puts_before_commit() -> usize {
    10_000
}

fn default_inline_threshold() -> usize {
    32
}

impl Default for PlanBConfig {
    fn default() -> Self {
        Self {
            max_store_size: default_max_store_size(),
            max_readers: default_max_readers(),
            max_puts_before_commit: default_max_puts_before_commit(),
            hash_length: HashLength::default(),
            inline_threshold: default_inline_threshold(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl PlanBConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_store_size < MIN_STORE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "max_store_size {} is below the minimum of {} bytes",
                self.max_store_size, MIN_STORE_SIZE
            )));
        }
        if usize::try_from(self.max_store_size).is_err() {
            return Err(Error::InvalidConfig(format!(
                "max_store_size {} does not fit in the address space",
                self.max_store_size
            )));
        }
        if self.max_readers == 0 {
            return Err(Error::InvalidConfig("max_readers must be at least 1".to_string()));
        }
        if self.maintenance.enabled && self.maintenance.interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "maintenance.interval_ms must be positive when maintenance is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Environment settings for one shape.
    pub fn env_settings(&self) -> EnvSettings {
        EnvSettings {
            map_size: usize::try_from(self.max_store_size).unwrap_or(usize::MAX),
            max_dbs: 4,
            max_readers: self.max_readers,
            max_puts_before_commit: self.max_puts_before_commit,
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Plan B state store configuration
#
# Maximum size in bytes of each shape's memory map (default: 1 GiB)
max_store_size = 1073741824

# Maximum concurrent read transactions per shape
max_readers = 126

# Bulk writes commit after this many changes (0 = single transaction)
max_puts_before_commit = 10000

# Dictionary hash width: "long" (8 bytes, default) or "integer" (4 bytes)
hash_length = "long"

# Encoded values longer than this many bytes are moved to the dictionary
inline_threshold = 32

[maintenance]
# Periodically sweep unused dictionary entries
enabled = false
interval_ms = 600000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PlanBConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
