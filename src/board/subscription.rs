//! Keeping the board registry and the transport's subscriptions in step.

use crate::board::registry::{BoardConfig, BoardRegistry};
use crate::error::{PqbbsError, Result};
use crate::graph::{Identity, Remote};
use crate::locking;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// The content-exchange service boards are replicated over.
///
/// Both calls report success as a plain `bool`; the caller turns a refusal
/// into `SubscriptionFailed`.
pub trait Transport: Remote {
    fn subscribe(&self, identity: &Identity) -> bool;

    fn unsubscribe(&self, identity: &Identity) -> bool;
}

/// Transport for a node with no peers.
///
/// Subscriptions are only recorded. It can be switched offline, after which
/// every call is refused.
#[derive(Debug)]
pub struct LocalTransport {
    subscriptions: RwLock<HashSet<Identity>>,
    online: AtomicBool,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTransport {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashSet::new()),
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_subscribed(&self, identity: &Identity) -> bool {
        locking::read(&self.subscriptions).contains(identity)
    }

    fn online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl Remote for LocalTransport {}

impl Transport for LocalTransport {
    fn subscribe(&self, identity: &Identity) -> bool {
        if !self.online() {
            return false;
        }
        locking::write(&self.subscriptions).insert(*identity);
        true
    }

    fn unsubscribe(&self, identity: &Identity) -> bool {
        if !self.online() {
            return false;
        }
        locking::write(&self.subscriptions).remove(identity);
        true
    }
}

/// Coordinates registry entries with transport subscriptions.
#[derive(Debug)]
pub struct SubscriptionManager<T: Transport> {
    registry: Arc<BoardRegistry>,
    transport: Arc<T>,
}

impl<T: Transport> SubscriptionManager<T> {
    pub fn new(registry: Arc<BoardRegistry>, transport: Arc<T>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Follows a board.
    ///
    /// A subscriber configuration is registered before the transport is asked.
    /// If the transport refuses, the identity is left unregistered. If the
    /// board was already registered, that configuration is returned as is.
    pub fn subscribe_to_board(&self, identity: &Identity) -> Result<BoardConfig> {
        let config = self
            .registry
            .get_or_add(BoardConfig::subscriber(*identity))
            .map_err(|e| e.in_transaction("Failed to register board"))?;

        if !self.transport.subscribe(identity) {
            warn!(board = %identity, "subscribe refused, rolling back registration");
            self.registry
                .remove_config(identity)
                .map_err(|e| e.in_transaction("Failed to roll back registration"))?;
            return Err(PqbbsError::subscription(format!(
                "transport refused subscription to board {}",
                identity
            )));
        }

        info!(board = %identity, master = config.is_master(), "subscribed");
        Ok(config)
    }

    /// Stops following a board.
    ///
    /// The registration is removed even if the transport then refuses.
    pub fn unsubscribe_from_board(&self, identity: &Identity) -> Result<()> {
        let removed = self
            .registry
            .remove_config(identity)
            .map_err(|e| e.in_transaction("Failed to remove registration"))?;

        if !self.transport.unsubscribe(identity) {
            warn!(board = %identity, "unsubscribe refused by transport");
            return Err(PqbbsError::subscription(format!(
                "transport refused unsubscription from board {}",
                identity
            )));
        }

        info!(board = %identity, was_registered = removed.is_some(), "unsubscribed");
        Ok(())
    }

    /// Asks the transport for the node's own board. Registry untouched.
    pub(crate) fn subscribe_transport(&self, identity: &Identity) -> Result<()> {
        if self.transport.subscribe(identity) {
            Ok(())
        } else {
            Err(PqbbsError::subscription(format!(
                "transport refused subscription to board {}",
                identity
            )))
        }
    }

    /// Re-subscribes every registered board. Returns the identities the
    /// transport refused; their registrations are kept.
    pub fn resubscribe_all(&self) -> Vec<Identity> {
        let mut refused = Vec::new();
        for config in self.registry.list() {
            if !self.transport.subscribe(config.identity()) {
                warn!(board = %config.identity(), "resubscribe refused");
                refused.push(*config.identity());
            }
        }
        info!(
            boards = self.registry.len(),
            refused = refused.len(),
            "resubscribed"
        );
        refused
    }

    pub fn registry(&self) -> &BoardRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
