// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Settings come from `org-manager.toml` layered with `ORG_MANAGER_*`
//! environment variables (`__` separates nested keys).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE: &str = "org-manager.toml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for backend data files (local store, snapshots)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Configured targets keyed by name
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

/// One `[targets.<name>]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Table name; filled in from the map key
    #[serde(skip)]
    pub name: String,
    /// Registered platform kind, e.g. `local`
    #[serde(default)]
    pub platform: String,
    /// Tenant slug used in identity tokens
    #[serde(default)]
    pub slug: String,
    /// Platform-specific settings
    #[serde(default)]
    pub options: toml::Table,
}

impl TargetConfig {
    /// String option, if present and a string
    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(toml::Value::as_str)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            targets: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Target configurations with their names filled in, ordered by name
    #[must_use]
    pub fn target_configs(&self) -> Vec<TargetConfig> {
        self.targets
            .iter()
            .map(|(name, target)| TargetConfig {
                name: name.clone(),
                ..target.clone()
            })
            .collect()
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "hyperpolymath", "org-manager")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".org-manager"))
}

/// Where to look for the configuration file when none is given
#[must_use]
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    directories::ProjectDirs::from("org", "hyperpolymath", "org-manager")
        .map(|d| d.config_dir().join(CONFIG_FILE))
        .unwrap_or(local)
}

/// Load configuration from disk and environment, falling back to defaults
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = path.map_or_else(default_config_path, Path::to_path_buf);
    let required = path.exists();

    let settings = config::Config::builder()
        .add_source(
            config::File::from(path.as_path())
                .format(config::FileFormat::Toml)
                .required(required),
        )
        .add_source(
            config::Environment::with_prefix("ORG_MANAGER")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read config {}", path.display()))?;

    let config: Config = settings
        .try_deserialize()
        .with_context(|| format!("Failed to parse config {}", path.display()))?;

    tracing::debug!(
        "Loaded {} target(s) from {}",
        config.targets.len(),
        path.display()
    );
    Ok(config)
}
