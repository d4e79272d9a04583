use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolve the platform state directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. CHATVAULT_STATE environment variable (with tilde expansion)
/// 3. XDG data directory
/// 4. ~/.chatvault (fallback for systems without XDG)
pub fn resolve_state_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("CHATVAULT_STATE") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("chatvault"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".chatvault"));
    }

    Err(Error::Config(
        "Could not determine state directory: no HOME directory or XDG data directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Default archive file location under a state directory.
pub fn archive_path(state_dir: &Path) -> PathBuf {
    state_dir.join("archive").join("chatvault.db")
}

/// Default scan roots: main/subagent session logs and cron run logs.
pub fn scan_roots(state_dir: &Path) -> Vec<PathBuf> {
    vec![state_dir.join("agents"), state_dir.join("cron").join("runs")]
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Override for the archive file path.
    #[serde(default)]
    pub archive_path: Option<PathBuf>,

    /// Extra scan roots on top of the defaults.
    #[serde(default)]
    pub extra_scan_roots: Vec<PathBuf>,
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Effective archive path: config override or the default layout.
    pub fn effective_archive_path(&self, state_dir: &Path) -> PathBuf {
        self.archive_path
            .clone()
            .unwrap_or_else(|| archive_path(state_dir))
    }

    /// Effective scan roots: defaults plus configured extras.
    pub fn effective_scan_roots(&self, state_dir: &Path) -> Vec<PathBuf> {
        let mut roots = scan_roots(state_dir);
        roots.extend(self.extra_scan_roots.iter().cloned());
        roots
    }
}
