//! Recovery cache written when a run is interrupted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Enough state to resume an interrupted run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryCache {
    pub profile: String,
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub skip_optional: bool,
    /// Raw answers recorded before the interruption
    #[serde(default)]
    pub answers: Map<String, Value>,
}

impl RecoveryCache {
    pub const FILE_NAME: &'static str = ".plinth-recovery.json";

    /// Cache location for a project directory.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(Self::FILE_NAME)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize recovery cache")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write recovery cache {}", path.display()))
    }

    /// Read a cache file; `None` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recovery cache {}", path.display()))?;
        let cache = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recovery cache {}", path.display()))?;
        Ok(Some(cache))
    }

    /// Remove the cache file if present.
    pub fn clear(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove recovery cache {}", path.display()))?;
        }
        Ok(())
    }
}
