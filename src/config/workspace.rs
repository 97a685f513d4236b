//! Workspace settings
//!
//! Loads and saves workspace settings from .workbench/config.toml. Settings
//! provide the workspace-root fallback for session working directories plus
//! workspace-wide environment overrides and shell preference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration file location, relative to a base directory
pub const CONFIG_DIR: &str = ".workbench";
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable naming the workspace root directory
pub const WORKSPACE_ROOT_ENV: &str = "WORKBENCH_WORKSPACE_ROOT";

/// Errors that can occur during workspace settings operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Workspace-level session defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkspaceSettings {
    /// Default working directory for new sessions
    pub root: Option<PathBuf>,
    /// Environment overrides applied to every session in this workspace,
    /// layered above the ambient process environment and below
    /// session-specific overrides
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Preferred shell executable for terminal sessions
    pub shell: Option<String>,
    /// Arguments passed to the preferred shell
    #[serde(default)]
    pub shell_args: Vec<String>,
}

impl WorkspaceSettings {
    /// Load settings from a base directory
    ///
    /// Returns defaults if no config file exists.
    pub fn load(base: &Path) -> Result<Self, ConfigError> {
        let config_path = base.join(CONFIG_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let settings: WorkspaceSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings under a base directory, creating .workbench if needed
    pub fn save(&self, base: &Path) -> Result<(), ConfigError> {
        let config_dir = base.join(CONFIG_DIR);

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    /// Effective workspace root: explicit setting, then the
    /// `WORKBENCH_WORKSPACE_ROOT` environment variable
    pub fn workspace_root(&self) -> Option<PathBuf> {
        self.root.clone().or_else(workspace_root_from_env)
    }
}

/// Workspace root taken from the environment, if set and non-empty
pub fn workspace_root_from_env() -> Option<PathBuf> {
    std::env::var(WORKSPACE_ROOT_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~/` (or bare `~`) to the user's home directory.
///
/// Paths without a tilde prefix pass through unchanged, as do tilde paths
/// when no home directory can be determined.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
