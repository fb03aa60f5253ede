//! Content-addressed object graph with signed, replaceable roots.
//!
//! Every board is a small tree of immutable objects hanging off a signed root
//! snapshot. Objects are addressed by the hash of their encoding, so changing
//! anything means storing new objects and publishing a new root that points at
//! them. This module knows nothing about boards; the domain plugs in through
//! [`GraphObject`] and [`Typed`].
//!
//! ## Components
//!
//! - [`Reference`] / [`Identity`]: 64-byte SHA3-512 digests
//! - [`RootSnapshot`]: signed, sequence-numbered list of child references
//! - [`ObjectStore`]: byte storage for objects and roots (memory or RocksDB)
//! - [`GraphNode`]: current-root table, transactions, fill and accept
//! - [`Cursor`]: typed search below one root and the root-replace protocol

pub mod cursor;
pub mod node;
pub mod object;
mod reference;
pub mod root;
pub mod store;

pub use cursor::{ContainerHandle, Cursor};
pub use node::{FillReport, GraphNode, Offline, Remote, Transaction};
pub use object::{flat_slot_mut, GraphObject, Typed};
pub use reference::{Identity, Reference};
pub use root::{RootContent, RootSnapshot};
pub use store::{MemoryObjectStore, ObjectStore, RocksObjectStore, CF_OBJECTS, CF_ROOTS};

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time in milliseconds since the Unix epoch.
///
/// A clock before the epoch reads as 0.
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
