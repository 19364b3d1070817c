//! Sigil configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SigilError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigilConfig {
    /// Where the schedule table is persisted.
    #[serde(default = "default_schedule_path")]
    pub schedule_path: String,
    /// Role access document, re-read on every authorization check.
    #[serde(default = "default_access_path")]
    pub access_path: String,
    /// When non-empty, only these top-level commands are registered.
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

fn default_schedule_path() -> String { "~/.sigil/scheduled_events.json".into() }
fn default_access_path() -> String { "~/.sigil/access.toml".into() }

impl Default for SigilConfig {
    fn default() -> Self {
        Self {
            schedule_path: default_schedule_path(),
            access_path: default_access_path(),
            allowed_commands: Vec::new(),
        }
    }
}

impl SigilConfig {
    /// Load config from the default path (~/.sigil/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SigilError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SigilError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Sigil home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sigil")
    }

    /// Schedule store path with `~` expanded.
    pub fn schedule_file(&self) -> PathBuf {
        expand(&self.schedule_path)
    }

    /// Access document path with `~` expanded.
    pub fn access_file(&self) -> PathBuf {
        expand(&self.access_path)
    }
}

fn expand(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}
