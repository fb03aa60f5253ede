//! Local object cache and root persistence.
//!
//! ## Storage Layout (RocksDB)
//!
//! - `objects`: `{reference}` -> encoded graph object
//! - `roots`: `{board identity}` -> bincode `RootSnapshot`

use crate::error::{PqbbsError, Result};
use crate::graph::{Identity, Reference, RootSnapshot};
use crate::locking;
use crate::storage::RocksDbHandle;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

/// Column family holding encoded objects.
pub const CF_OBJECTS: &str = "objects";

/// Column family holding the current root of every known board.
pub const CF_ROOTS: &str = "roots";

/// Byte-level storage for graph objects and current roots.
///
/// Objects are immutable and keyed by their own hash, so `put_object` of an
/// existing reference is a no-op in effect.
pub trait ObjectStore: Send + Sync {
    /// Stores encoded object bytes under their reference.
    fn put_object(&self, reference: &Reference, bytes: &[u8]) -> Result<()>;

    /// Loads encoded object bytes.
    fn get_object(&self, reference: &Reference) -> Result<Option<Vec<u8>>>;

    /// Returns true if the object is cached locally.
    fn contains_object(&self, reference: &Reference) -> Result<bool>;

    /// Persists a board's current root, replacing the previous one.
    fn save_root(&self, root: &RootSnapshot) -> Result<()>;

    /// Forgets a board's current root.
    fn delete_root(&self, identity: &Identity) -> Result<()>;

    /// Loads every persisted root.
    fn load_roots(&self) -> Result<Vec<RootSnapshot>>;
}

/// Volatile store for tests and in-memory nodes.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<Reference, Vec<u8>>>,
    roots: RwLock<HashMap<Identity, RootSnapshot>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached objects.
    pub fn object_count(&self) -> usize {
        locking::read(&self.objects).len()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_object(&self, reference: &Reference, bytes: &[u8]) -> Result<()> {
        locking::write(&self.objects)
            .entry(*reference)
            .or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn get_object(&self, reference: &Reference) -> Result<Option<Vec<u8>>> {
        Ok(locking::read(&self.objects).get(reference).cloned())
    }

    fn contains_object(&self, reference: &Reference) -> Result<bool> {
        Ok(locking::read(&self.objects).contains_key(reference))
    }

    fn save_root(&self, root: &RootSnapshot) -> Result<()> {
        locking::write(&self.roots).insert(*root.identity(), root.clone());
        Ok(())
    }

    fn delete_root(&self, identity: &Identity) -> Result<()> {
        locking::write(&self.roots).remove(identity);
        Ok(())
    }

    fn load_roots(&self) -> Result<Vec<RootSnapshot>> {
        Ok(locking::read(&self.roots).values().cloned().collect())
    }
}

/// RocksDB-backed store.
#[derive(Debug, Clone)]
pub struct RocksObjectStore {
    db: RocksDbHandle,
}

impl RocksObjectStore {
    /// Wraps a handle opened with the `objects` and `roots` column families.
    pub fn new(db: RocksDbHandle) -> Self {
        Self { db }
    }
}

impl ObjectStore for RocksObjectStore {
    fn put_object(&self, reference: &Reference, bytes: &[u8]) -> Result<()> {
        self.db.put_raw(CF_OBJECTS, reference.as_bytes(), bytes)
    }

    fn get_object(&self, reference: &Reference) -> Result<Option<Vec<u8>>> {
        self.db.get_raw(CF_OBJECTS, reference.as_bytes())
    }

    fn contains_object(&self, reference: &Reference) -> Result<bool> {
        self.db.exists(CF_OBJECTS, reference.as_bytes())
    }

    fn save_root(&self, root: &RootSnapshot) -> Result<()> {
        trace!(board = %root.identity(), seq = root.seq(), "save_root");
        self.db.put(CF_ROOTS, root.identity().as_bytes(), root)
    }

    fn delete_root(&self, identity: &Identity) -> Result<()> {
        self.db.delete(CF_ROOTS, identity.as_bytes())
    }

    fn load_roots(&self) -> Result<Vec<RootSnapshot>> {
        let mut roots = Vec::new();
        let mut failure = None;
        self.db.iterate_all(CF_ROOTS, |_, value| {
            match bincode::deserialize::<RootSnapshot>(value) {
                Ok(root) => roots.push(root),
                Err(e) => {
                    failure = Some(PqbbsError::serialization(format!(
                        "Failed to decode stored root: {}",
                        e
                    )));
                    return false;
                }
            }
            true
        })?;
        match failure {
            Some(err) => Err(err),
            None => Ok(roots),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::storage::RocksDbConfig;
    use tempfile::TempDir;

    fn exercise_store(store: &dyn ObjectStore) {
        let bytes = b"encoded object".to_vec();
        let reference = Reference::of_bytes(&bytes);

        assert!(!store.contains_object(&reference).unwrap());
        store.put_object(&reference, &bytes).unwrap();
        assert!(store.contains_object(&reference).unwrap());
        assert_eq!(store.get_object(&reference).unwrap(), Some(bytes));

        let keypair = KeyPair::generate_mldsa87().unwrap();
        let root = RootSnapshot::create(&keypair, vec![reference]).unwrap();
        store.save_root(&root).unwrap();
        let next = root.successor(&keypair, vec![]).unwrap();
        store.save_root(&next).unwrap();

        let roots = store.load_roots().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].seq(), 1);

        store.delete_root(root.identity()).unwrap();
        assert!(store.load_roots().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryObjectStore::new();
        exercise_store(&store);
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn test_rocks_store() {
        let temp_dir = TempDir::new().unwrap();
        let db = RocksDbHandle::open(
            temp_dir.path().join("db"),
            &RocksDbConfig::default(),
            &[CF_OBJECTS, CF_ROOTS],
        )
        .unwrap();
        exercise_store(&RocksObjectStore::new(db));
    }
}
