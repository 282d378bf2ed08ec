use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Metadata store used when `--store` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Page fixture used when `--fixture` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_path: Option<PathBuf>,

    #[serde(default)]
    pub pretty: bool,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Store path with the platform data directory as the fallback
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }
}

/// `<data dir>/tagalyst/store.json`, or `./.tagalyst/store.json` when the
/// platform has no data directory
pub fn default_store_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("tagalyst").join("store.json"),
        None => PathBuf::from(".tagalyst").join("store.json"),
    }
}
