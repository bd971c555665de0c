//! The `ies4` configuration file: registry settings at the top level, the
//! notifier under `notifier`.

use anyhow::{Context, Result};
use ies4_notify::NotifierConfig;
use ies4_registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Consulted when `--config` is not given.
pub const CONFIG_ENV: &str = "IES4_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ies4Config {
    #[serde(flatten)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Ies4Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// `--config`, then `$IES4_CONFIG`, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let source = explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var_os(CONFIG_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        });
        match source {
            Some(path) => {
                let config = Self::from_file(&path)?;
                tracing::info!(path = %path.display(), "loaded config");
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }
}
