//! The local object graph: object cache, current-root table and transactions.

use crate::crypto::KeyPair;
use crate::error::{PqbbsError, Result};
use crate::graph::cursor::Cursor;
use crate::graph::{GraphObject, Identity, ObjectStore, Reference, RootSnapshot, Typed};
use crate::locking;
use std::collections::{HashMap, HashSet, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, trace, warn};

/// What the graph needs from the network.
pub trait Remote: Send + Sync {
    /// Fetches encoded object bytes from peers. `None` if no peer has them.
    fn fetch_object(&self, _reference: &Reference) -> Option<Vec<u8>> {
        None
    }

    /// Publishes a newly committed root to subscribers.
    fn announce_root(&self, _root: &RootSnapshot) {}
}

/// A remote that knows nothing and tells no one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl Remote for Offline {}

/// Outcome of a fill pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FillReport {
    /// References reachable from the root.
    pub reachable: usize,
    /// References that had to be fetched from the remote.
    pub fetched: usize,
}

/// A content-addressed object graph with one current root per board.
pub struct GraphNode<O: GraphObject> {
    store: Arc<dyn ObjectStore>,
    remote: Arc<dyn Remote>,
    roots: RwLock<HashMap<Identity, RootSnapshot>>,
    transaction_lock: Mutex<()>,
    _objects: PhantomData<fn() -> O>,
}

impl<O: GraphObject> std::fmt::Debug for GraphNode<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("roots", &locking::read(&self.roots).len())
            .finish_non_exhaustive()
    }
}

impl<O: GraphObject> GraphNode<O> {
    /// Opens a graph over `store`, loading every persisted root.
    pub fn new(store: Arc<dyn ObjectStore>, remote: Arc<dyn Remote>) -> Result<Self> {
        let roots: HashMap<_, _> = store
            .load_roots()?
            .into_iter()
            .map(|root| (*root.identity(), root))
            .collect();
        debug!(roots = roots.len(), "graph opened");

        Ok(Self {
            store,
            remote,
            roots: RwLock::new(roots),
            transaction_lock: Mutex::new(()),
            _objects: PhantomData,
        })
    }

    /// Returns the remote this graph fills from and announces to.
    pub fn remote(&self) -> &dyn Remote {
        self.remote.as_ref()
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Content-addresses and persists an object.
    pub fn store(&self, object: &O) -> Result<Reference> {
        let bytes = object.encode()?;
        let reference = Reference::of_bytes(&bytes);
        if !self.store.contains_object(&reference)? {
            self.store.put_object(&reference, &bytes)?;
            trace!(reference = %reference, kind = object.type_name(), "stored object");
        }
        Ok(reference)
    }

    /// Loads an object from the local cache.
    pub fn load(&self, reference: &Reference) -> Result<O> {
        let bytes = self
            .store
            .get_object(reference)?
            .ok_or_else(|| PqbbsError::not_found(format!("object {}", reference)))?;
        O::decode(&bytes)
    }

    /// Loads an object and checks that it is a `T`.
    pub fn deserialize<T: Typed<O>>(&self, reference: &Reference) -> Result<T> {
        let object = self.load(reference)?;
        let found = object.type_name();
        T::from_object(object).ok_or_else(|| {
            PqbbsError::serialization(format!(
                "object {} is a {}, expected {}",
                reference,
                found,
                T::TYPE_NAME
            ))
        })
    }

    // =========================================================================
    // Roots
    // =========================================================================

    /// Returns the current root of a board, if this node has one.
    pub fn latest_root(&self, identity: &Identity) -> Option<RootSnapshot> {
        locking::read(&self.roots).get(identity).cloned()
    }

    /// Opens a cursor that may replace the root. The key must own the board.
    pub fn open_cursor_on_latest_root<'a>(
        &'a self,
        identity: &Identity,
        signer: &'a KeyPair,
    ) -> Result<Cursor<'a, O>> {
        if Identity::of_key(signer.public_key()) != *identity {
            return Err(PqbbsError::not_master(format!(
                "signing key does not own board {}",
                identity
            )));
        }
        let root = self.require_root(identity)?;
        Ok(Cursor::new(self, root, Some(signer)))
    }

    /// Opens a read-only cursor on one root snapshot.
    pub fn open_reader(&self, identity: &Identity) -> Result<Cursor<'_, O>> {
        let root = self.require_root(identity)?;
        Ok(Cursor::new(self, root, None))
    }

    fn require_root(&self, identity: &Identity) -> Result<RootSnapshot> {
        self.latest_root(identity)
            .ok_or_else(|| PqbbsError::not_found(format!("no root for board {}", identity)))
    }

    /// Runs `f` with exclusive access to root creation.
    ///
    /// Roots created inside the transaction become current only if `f`
    /// returns `Ok`. Objects stored before a failure stay behind as
    /// unreferenced garbage.
    pub fn execute_transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction<'_, O>) -> Result<R>,
    {
        let _guard = locking::lock(&self.transaction_lock);
        let mut txn = Transaction {
            node: self,
            pending: Vec::new(),
        };
        let result = f(&mut txn)?;

        for root in &txn.pending {
            self.fill(root)?;
        }
        for root in txn.pending {
            self.commit(root, None)?;
        }
        Ok(result)
    }

    /// Makes sure every reference reachable from `root` resolves locally.
    ///
    /// Missing objects are fetched from the remote and checked against their
    /// reference before they are cached.
    pub fn fill(&self, root: &RootSnapshot) -> Result<FillReport> {
        let mut report = FillReport::default();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Reference> = root.refs().iter().copied().collect();

        while let Some(reference) = queue.pop_front() {
            if !seen.insert(reference) {
                continue;
            }
            report.reachable += 1;

            let bytes = match self.store.get_object(&reference)? {
                Some(bytes) => bytes,
                None => {
                    let bytes = self.remote.fetch_object(&reference).ok_or_else(|| {
                        PqbbsError::transaction(format!(
                            "dangling reference {} under root {} of board {}",
                            reference,
                            root.seq(),
                            root.identity()
                        ))
                    })?;
                    if Reference::of_bytes(&bytes) != reference {
                        return Err(PqbbsError::transaction(format!(
                            "fetched object does not match reference {}",
                            reference
                        )));
                    }
                    self.store.put_object(&reference, &bytes)?;
                    report.fetched += 1;
                    bytes
                }
            };

            let object = O::decode(&bytes)
                .map_err(|e| PqbbsError::corrupt(format!("fill {}", reference), e))?;
            queue.extend(object.child_refs());
        }

        trace!(
            board = %root.identity(),
            seq = root.seq(),
            reachable = report.reachable,
            fetched = report.fetched,
            "fill complete"
        );
        Ok(report)
    }

    /// Swaps in `root` if the current root still has sequence `expected_seq`
    /// (`None`: the board must have no root yet).
    pub(crate) fn commit(&self, root: RootSnapshot, expected_seq: Option<u64>) -> Result<()> {
        let mut roots = locking::write(&self.roots);
        let current_seq = roots.get(root.identity()).map(RootSnapshot::seq);
        if current_seq != expected_seq {
            return Err(PqbbsError::transaction(format!(
                "stale root for board {}: expected seq {:?}, current {:?}",
                root.identity(),
                expected_seq,
                current_seq
            )));
        }

        self.store
            .save_root(&root)
            .map_err(|e| PqbbsError::transaction(format!("Failed to persist root: {}", e)))?;
        debug!(board = %root.identity(), seq = root.seq(), "root committed");
        roots.insert(*root.identity(), root);
        Ok(())
    }

    /// Accepts a root published by a board owner.
    ///
    /// The root must verify and must be newer than the local one.
    pub fn accept_root(&self, root: RootSnapshot) -> Result<FillReport> {
        root.verify()
            .map_err(|e| PqbbsError::corrupt(format!("root of board {}", root.identity()), e))?;

        let current_seq = self.latest_root(root.identity()).map(|r| r.seq());
        if let Some(seq) = current_seq {
            if root.seq() <= seq {
                warn!(
                    board = %root.identity(),
                    offered = root.seq(),
                    current = seq,
                    "rejected stale root"
                );
                return Err(PqbbsError::transaction(format!(
                    "root seq {} is not newer than {}",
                    root.seq(),
                    seq
                )));
            }
        }

        let report = self.fill(&root)?;
        self.commit(root, current_seq)?;
        Ok(report)
    }

    /// Drops a board's current root without publishing anything.
    pub fn discard_root(&self, identity: &Identity) -> Result<()> {
        let mut roots = locking::write(&self.roots);
        self.store.delete_root(identity)?;
        roots.remove(identity);
        Ok(())
    }
}

/// Exclusive access to root creation, handed out by
/// [`GraphNode::execute_transaction`].
pub struct Transaction<'a, O: GraphObject> {
    node: &'a GraphNode<O>,
    pending: Vec<RootSnapshot>,
}

impl<O: GraphObject> Transaction<'_, O> {
    /// Stores `children` and creates the first root of the board owned by
    /// `keypair`. The root becomes current when the transaction commits.
    pub fn new_root(&mut self, keypair: &KeyPair, children: &[O]) -> Result<RootSnapshot> {
        let identity = Identity::of_key(keypair.public_key());
        if self.node.latest_root(&identity).is_some()
            || self.pending.iter().any(|r| r.identity() == &identity)
        {
            return Err(PqbbsError::already_exists(format!(
                "board {} already has a root",
                identity
            )));
        }

        let refs = children
            .iter()
            .map(|child| self.node.store(child))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| PqbbsError::transaction(format!("Failed to store root children: {}", e)))?;
        let root = RootSnapshot::create(keypair, refs)
            .map_err(|e| PqbbsError::transaction(format!("Failed to sign root: {}", e)))?;

        self.pending.push(root.clone());
        Ok(root)
    }

    /// Returns the graph this transaction runs against.
    pub fn node(&self) -> &GraphNode<O> {
        self.node
    }
}
