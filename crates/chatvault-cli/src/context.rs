use anyhow::Result;
use chatvault_runtime::config::{resolve_state_dir, Config};
use chatvault_store::Archive;
use std::path::PathBuf;

/// Resolved environment for one CLI invocation.
pub struct CliContext {
    pub state_dir: PathBuf,
    pub config: Config,
}

impl CliContext {
    pub fn resolve(state_dir_arg: Option<&str>) -> Result<Self> {
        let state_dir = resolve_state_dir(state_dir_arg)?;
        let config = Config::load_from(&Config::default_path(&state_dir))?;
        Ok(Self { state_dir, config })
    }

    pub fn open_archive(&self) -> Result<Archive> {
        let path = self.config.effective_archive_path(&self.state_dir);
        Ok(Archive::open(&path)?)
    }

    pub fn scan_roots(&self) -> Vec<PathBuf> {
        self.config.effective_scan_roots(&self.state_dir)
    }
}
