//! Board registry: which boards this node knows and in which role.
//!
//! ## Storage Layout (RocksDB)
//!
//! - `boards`: `{board identity}` -> bincode `BoardConfig`
//!
//! Signing keys are stored as-is; the data directory must be private to the
//! node's user.

use crate::crypto::KeyPair;
use crate::error::{PqbbsError, Result};
use crate::graph::Identity;
use crate::locking;
use crate::storage::RocksDbHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tracing::{info, trace};

/// Column family holding board configurations.
pub const CF_BOARDS: &str = "boards";

/// How this node relates to one board.
///
/// A signing key is present exactly when the node is the board's master.
#[derive(Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    identity: Identity,
    keypair: Option<KeyPair>,
    master: bool,
}

impl fmt::Debug for BoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardConfig")
            .field("identity", &self.identity)
            .field("master", &self.master)
            .finish()
    }
}

impl BoardConfig {
    /// Configuration for a board owned by `keypair`.
    pub fn master(keypair: KeyPair) -> Self {
        Self {
            identity: Identity::of_key(keypair.public_key()),
            keypair: Some(keypair),
            master: true,
        }
    }

    /// Configuration for following someone else's board.
    pub fn subscriber(identity: Identity) -> Self {
        Self {
            identity,
            keypair: None,
            master: false,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_master(&self) -> bool {
        self.master
    }

    /// The key that may replace this board's root.
    ///
    /// # Errors
    /// `NotMaster` for subscriber configurations.
    pub fn signing_key(&self) -> Result<&KeyPair> {
        self.keypair.as_ref().ok_or_else(|| {
            PqbbsError::not_master(format!("no signing key for board {}", self.identity))
        })
    }

    fn check(&self) -> Result<()> {
        match (&self.keypair, self.master) {
            (Some(keypair), true) if Identity::of_key(keypair.public_key()) == self.identity => {
                Ok(())
            }
            (None, false) => Ok(()),
            _ => Err(PqbbsError::validation(format!(
                "inconsistent configuration for board {}",
                self.identity
            ))),
        }
    }
}

/// Identity-keyed set of board configurations, optionally written through to
/// RocksDB.
#[derive(Debug)]
pub struct BoardRegistry {
    boards: RwLock<HashMap<Identity, BoardConfig>>,
    db: Option<RocksDbHandle>,
}

impl Default for BoardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardRegistry {
    /// Creates an empty, volatile registry.
    pub fn new() -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    /// Opens a persistent registry, loading every stored configuration.
    ///
    /// The handle must have been opened with the `boards` column family.
    pub fn open(db: RocksDbHandle) -> Result<Self> {
        let mut boards = HashMap::new();
        let mut failure = None;
        db.iterate_all(CF_BOARDS, |_, value| {
            let decoded = bincode::deserialize::<BoardConfig>(value)
                .map_err(|e| {
                    PqbbsError::serialization(format!("Failed to decode board config: {}", e))
                })
                .and_then(|config| config.check().map(|_| config));
            match decoded {
                Ok(config) => {
                    boards.insert(config.identity, config);
                    true
                }
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }

        info!(boards = boards.len(), "board registry opened");
        Ok(Self {
            boards: RwLock::new(boards),
            db: Some(db),
        })
    }

    fn persist(&self, config: &BoardConfig) -> Result<()> {
        if let Some(db) = &self.db {
            trace!(board = %config.identity, "persist board config");
            db.put(CF_BOARDS, config.identity.as_bytes(), config)?;
        }
        Ok(())
    }

    /// Registers a new configuration.
    ///
    /// # Errors
    /// `AlreadyExists` if the identity is registered.
    pub fn add_config(&self, config: BoardConfig) -> Result<()> {
        config.check()?;
        let mut boards = locking::write(&self.boards);
        if boards.contains_key(&config.identity) {
            return Err(PqbbsError::already_exists(format!(
                "board {} is already registered",
                config.identity
            )));
        }
        self.persist(&config)?;
        boards.insert(config.identity, config);
        Ok(())
    }

    /// Returns the registered configuration for the identity, registering
    /// `config` first if there is none.
    pub fn get_or_add(&self, config: BoardConfig) -> Result<BoardConfig> {
        config.check()?;
        let mut boards = locking::write(&self.boards);
        if let Some(existing) = boards.get(&config.identity) {
            return Ok(existing.clone());
        }
        self.persist(&config)?;
        boards.insert(config.identity, config.clone());
        Ok(config)
    }

    pub fn get_config(&self, identity: &Identity) -> Option<BoardConfig> {
        locking::read(&self.boards).get(identity).cloned()
    }

    pub fn has_config(&self, identity: &Identity) -> bool {
        locking::read(&self.boards).contains_key(identity)
    }

    /// Forgets a board. Returns the removed configuration, if any.
    pub fn remove_config(&self, identity: &Identity) -> Result<Option<BoardConfig>> {
        let mut boards = locking::write(&self.boards);
        if let Some(db) = &self.db {
            db.delete(CF_BOARDS, identity.as_bytes())?;
        }
        Ok(boards.remove(identity))
    }

    /// All registered configurations, ordered by identity.
    pub fn list(&self) -> Vec<BoardConfig> {
        let mut configs: Vec<_> = locking::read(&self.boards).values().cloned().collect();
        configs.sort_by(|a, b| a.identity.cmp(&b.identity));
        configs
    }

    pub fn len(&self) -> usize {
        locking::read(&self.boards).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
