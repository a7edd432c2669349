//! Ambient configuration: cache tuning and device bootstrap info.
//!
//! Full credential resolution (mapping a device name to its remote URL and
//! password via the provisioning flow) is an out-of-scope external
//! collaborator (spec.md §1); `DeviceConfig` here is the already-resolved
//! shape the driver needs at mount time, loaded from a small TOML file for
//! convenience.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    Ttl,
    Lru,
    None,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub cache_strategy: CacheStrategy,
    pub cache_ttl_seconds: u64,
    pub cache_lru_capacity: usize,
    pub kernel_attr_timeout_seconds: u64,
    pub kernel_entry_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_strategy: CacheStrategy::Ttl,
            cache_ttl_seconds: 10,
            cache_lru_capacity: 1000,
            kernel_attr_timeout_seconds: 5,
            kernel_entry_timeout_seconds: 5,
        }
    }
}

pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        tracing::warn!(?path, "config file not found, using defaults");
        return Config::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(?path, error = %e, "could not read config file, using defaults");
            return Config::default();
        }
    };

    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(?path, error = %e, "could not parse config file, using defaults");
            Config::default()
        }
    }
}

/// Per-device bootstrap info: where the remote document store lives and
/// where this device's binary cache lives on disk.
///
/// Corresponds to the `Device` document's `url`/`password` fields
/// (spec.md §6) plus the `<home>/.cozyfuse/<device>` on-disk layout.
#[derive(Deserialize, Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub database: String,
    pub url: String,
    #[serde(default)]
    pub password: String,
}

impl DeviceConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// `<home>/.cozyfuse/<device>`, the device's config/cache root
    /// (spec.md §6 "On-disk layout").
    pub fn config_dir(&self) -> PathBuf {
        dirs_home().join(".cozyfuse").join(&self.name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config_dir().join("cache")
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/"))
}

/// Default location of a device's bootstrap file, `~/.cozyfuse/<device>/device.toml`,
/// used by `main.rs` when `mount` isn't given an explicit `--device-config`.
pub fn device_toml_path(device_name: &str) -> PathBuf {
    dirs_home().join(".cozyfuse").join(device_name).join("device.toml")
}
