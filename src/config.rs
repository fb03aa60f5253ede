//! Node configuration.
//!
//! Built from defaults, then environment variables, then command-line flags:
//!
//! | Variable          | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `PQBBS_DATA`      | data directory (unset: in-memory node)    |
//! | `PQBBS_LOG`       | tracing filter when `RUST_LOG` is unset   |
//! | `PQBBS_DB_PROFILE`| `server` for larger RocksDB buffers       |

use crate::error::{PqbbsError, Result};
use crate::storage::RocksDbConfig;
use std::env;
use std::path::PathBuf;

/// Default tracing filter.
pub const DEFAULT_LOG_FILTER: &str = "pqbbs=info";

/// Settings for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Where RocksDB lives. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Database tuning.
    pub rocksdb: RocksDbConfig,
    /// Tracing filter directive.
    pub log_filter: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            rocksdb: RocksDbConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl NodeConfig {
    /// An in-memory node.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A persistent node rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    /// Defaults overridden by `PQBBS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("PQBBS_DATA").filter(|d| !d.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(filter) = lookup("PQBBS_LOG").filter(|f| !f.is_empty()) {
            config.log_filter = filter;
        }
        match lookup("PQBBS_DB_PROFILE").as_deref() {
            None | Some("") | Some("default") => {}
            Some("server") => config.rocksdb = RocksDbConfig::for_server(),
            Some(other) => {
                return Err(PqbbsError::config(format!(
                    "unknown PQBBS_DB_PROFILE '{}' (expected 'default' or 'server')",
                    other
                )))
            }
        }

        Ok(config)
    }

    /// Path of the node database, if persistent.
    pub fn db_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("db"))
    }
}
