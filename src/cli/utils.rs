//! Utility functions for CLI operations.

use crate::config::NodeConfig;
use crate::error::{PqbbsError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Get the default data directory (`~/.pqbbs`)
pub fn default_data_dir() -> Result<PathBuf> {
    let home = env::var("HOME")
        .map_err(|_| PqbbsError::config("HOME environment variable not set"))?;
    Ok(Path::new(&home).join(".pqbbs"))
}

/// Resolve the node configuration: `--data-dir`, then `PQBBS_DATA`, then the
/// default directory. The CLI never runs an in-memory node, since nothing
/// would survive the process.
pub fn resolve_config(data_dir: Option<PathBuf>) -> Result<NodeConfig> {
    let mut config = NodeConfig::from_env()?;
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir);
    }
    if config.data_dir.is_none() {
        config.data_dir = Some(default_data_dir()?);
    }
    Ok(config)
}
