//! Cursors over one root snapshot.
//!
//! A cursor walks the graph below the root it was opened on. `advance` finds a
//! container by type and predicate and remembers the path it took, so that
//! `replace_current` can rewrite every ancestor up to a new signed root.

use crate::crypto::KeyPair;
use crate::error::{PqbbsError, Result};
use crate::graph::node::GraphNode;
use crate::graph::{GraphObject, Reference, RootSnapshot, Typed};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use tracing::{debug, trace};

/// One hop from a parent to a child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathStep {
    /// `None` when the parent is the root.
    parent: Option<Reference>,
    /// Index into the parent's child references.
    index: usize,
}

/// A decoded container together with where it was found.
///
/// Mutate the value through `DerefMut`, then hand the handle back to
/// [`Cursor::replace_current`].
#[derive(Debug, Clone)]
pub struct ContainerHandle<T> {
    value: T,
    reference: Reference,
    path: Vec<PathStep>,
}

impl<T> ContainerHandle<T> {
    /// Reference the container had when it was found.
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Distance from the root (1 for direct children).
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Consumes the handle, returning the container.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for ContainerHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for ContainerHandle<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// A view of a board's graph at one root snapshot.
pub struct Cursor<'a, O: GraphObject> {
    node: &'a GraphNode<O>,
    root: RootSnapshot,
    signer: Option<&'a KeyPair>,
}

impl<'a, O: GraphObject> Cursor<'a, O> {
    pub(crate) fn new(
        node: &'a GraphNode<O>,
        root: RootSnapshot,
        signer: Option<&'a KeyPair>,
    ) -> Self {
        Self { node, root, signer }
    }

    /// The root this cursor currently points at.
    pub fn root(&self) -> &RootSnapshot {
        &self.root
    }

    /// Finds the first `T` below the root, in breadth-first order, for which
    /// `finder` returns true.
    ///
    /// # Errors
    /// `NotFound` if nothing matches; `Corrupt` if a reachable object cannot
    /// be loaded.
    pub fn advance<T, F>(&self, finder: F) -> Result<ContainerHandle<T>>
    where
        T: Typed<O>,
        F: Fn(&T) -> bool,
    {
        let mut parents: HashMap<Reference, PathStep> = HashMap::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        for (index, reference) in self.root.refs().iter().enumerate() {
            if seen.insert(*reference) {
                parents.insert(*reference, PathStep { parent: None, index });
                queue.push_back(*reference);
            }
        }

        while let Some(reference) = queue.pop_front() {
            let object = self.node.load(&reference).map_err(|e| {
                PqbbsError::corrupt(
                    format!("board {} seq {}", self.root.identity(), self.root.seq()),
                    e,
                )
            })?;
            let children = object.child_refs();

            if let Some(value) = T::from_object(object) {
                if finder(&value) {
                    trace!(reference = %reference, kind = T::TYPE_NAME, "advance matched");
                    return Ok(ContainerHandle {
                        value,
                        reference,
                        path: Self::path_to(&parents, reference),
                    });
                }
            }

            for (index, child) in children.into_iter().enumerate() {
                if seen.insert(child) {
                    parents.insert(
                        child,
                        PathStep {
                            parent: Some(reference),
                            index,
                        },
                    );
                    queue.push_back(child);
                }
            }
        }

        Err(PqbbsError::not_found(format!(
            "no matching {} under board {}",
            T::TYPE_NAME,
            self.root.identity()
        )))
    }

    fn path_to(parents: &HashMap<Reference, PathStep>, target: Reference) -> Vec<PathStep> {
        let mut path = Vec::new();
        let mut current = target;
        while let Some(step) = parents.get(&current) {
            path.push(*step);
            match step.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Loads a referenced object of a known type.
    pub fn deserialize<T: Typed<O>>(&self, reference: &Reference) -> Result<T> {
        self.node.deserialize(reference)
    }

    /// Stores an object that is not yet reachable, returning its reference.
    ///
    /// # Errors
    /// `TransactionFailed` if the object cannot be encoded or written.
    pub fn save<T: Typed<O>>(&self, value: &T) -> Result<Reference> {
        self.node
            .store(&value.clone().into_object())
            .map_err(|e| {
                PqbbsError::transaction(format!("Failed to store {}: {}", T::TYPE_NAME, e))
            })
    }

    /// Publishes a new root in which the container behind `handle` is replaced
    /// by its (mutated) value.
    ///
    /// Every ancestor on the handle's path is re-stored with the new child
    /// reference; the new root has `seq + 1`, is filled, committed against the
    /// old sequence number and announced.
    ///
    /// # Errors
    /// `NotMaster` for a read-only cursor; `TransactionFailed` for anything
    /// that prevented the new root from becoming current.
    pub fn replace_current<T: Typed<O>>(
        &mut self,
        handle: ContainerHandle<T>,
    ) -> Result<RootSnapshot> {
        let signer = self.signer.ok_or_else(|| {
            PqbbsError::not_master(format!(
                "read-only cursor on board {}",
                self.root.identity()
            ))
        })?;

        let root = self.rebuild_root(signer, handle).map_err(|e| match e {
            PqbbsError::NotMaster(_) | PqbbsError::TransactionFailed(_) => e,
            other => PqbbsError::transaction(format!("Failed to replace root: {}", other)),
        })?;

        self.node.remote().announce_root(&root);
        debug!(board = %root.identity(), seq = root.seq(), "root replaced");
        self.root = root.clone();
        Ok(root)
    }

    fn rebuild_root<T: Typed<O>>(
        &self,
        signer: &KeyPair,
        handle: ContainerHandle<T>,
    ) -> Result<RootSnapshot> {
        let mut replacement = self.node.store(&handle.value.into_object())?;
        let mut refs = self.root.refs().to_vec();

        for step in handle.path.iter().rev() {
            match step.parent {
                Some(parent) => {
                    let mut object = self.node.load(&parent)?;
                    object.replace_child_ref(step.index, replacement)?;
                    replacement = self.node.store(&object)?;
                }
                None => {
                    let slot = refs.get_mut(step.index).ok_or_else(|| {
                        PqbbsError::transaction(format!("root has no child slot {}", step.index))
                    })?;
                    *slot = replacement;
                }
            }
        }

        let next = self.root.successor(signer, refs)?;
        self.node.fill(&next)?;
        self.node.commit(next.clone(), Some(self.root.seq()))?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{Offline, Remote};
    use crate::graph::{Identity, MemoryObjectStore, ObjectStore};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Leaf(u32);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Branch(Vec<Reference>);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestObject {
        Leaf(Leaf),
        Branch(Branch),
    }

    impl GraphObject for TestObject {
        fn type_name(&self) -> &'static str {
            match self {
                TestObject::Leaf(_) => "Leaf",
                TestObject::Branch(_) => "Branch",
            }
        }

        fn child_refs(&self) -> Vec<Reference> {
            match self {
                TestObject::Leaf(_) => Vec::new(),
                TestObject::Branch(b) => b.0.clone(),
            }
        }

        fn replace_child_ref(&mut self, index: usize, reference: Reference) -> Result<()> {
            match self {
                TestObject::Branch(b) if index < b.0.len() => {
                    b.0[index] = reference;
                    Ok(())
                }
                _ => Err(PqbbsError::validation("no such child")),
            }
        }
    }

    impl Typed<TestObject> for Leaf {
        const TYPE_NAME: &'static str = "Leaf";

        fn into_object(self) -> TestObject {
            TestObject::Leaf(self)
        }

        fn from_object(object: TestObject) -> Option<Self> {
            match object {
                TestObject::Leaf(l) => Some(l),
                _ => None,
            }
        }
    }

    impl Typed<TestObject> for Branch {
        const TYPE_NAME: &'static str = "Branch";

        fn into_object(self) -> TestObject {
            TestObject::Branch(self)
        }

        fn from_object(object: TestObject) -> Option<Self> {
            match object {
                TestObject::Branch(b) => Some(b),
                _ => None,
            }
        }
    }

    fn setup() -> (GraphNode<TestObject>, KeyPair, Identity) {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let remote: Arc<dyn Remote> = Arc::new(Offline);
        let node = GraphNode::new(store, remote).unwrap();
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let identity = Identity::of_key(keypair.public_key());

        node.execute_transaction(|txn| {
            let nested = txn.node().store(&TestObject::Leaf(Leaf(7)))?;
            txn.new_root(
                &keypair,
                &[
                    TestObject::Leaf(Leaf(1)),
                    TestObject::Branch(Branch(vec![nested])),
                ],
            )
        })
        .unwrap();

        (node, keypair, identity)
    }

    #[test]
    fn test_advance_finds_by_predicate() {
        let (node, _, identity) = setup();
        let reader = node.open_reader(&identity).unwrap();

        let leaf: ContainerHandle<Leaf> = reader.advance(|l: &Leaf| l.0 == 7).unwrap();
        assert_eq!(leaf.0, 7);
        assert_eq!(leaf.depth(), 2);

        let missing = reader.advance(|l: &Leaf| l.0 == 99);
        assert!(matches!(missing, Err(PqbbsError::NotFound(_))));
    }

    #[test]
    fn test_replace_direct_child() {
        let (node, keypair, identity) = setup();
        let mut cursor = node.open_cursor_on_latest_root(&identity, &keypair).unwrap();

        let mut leaf: ContainerHandle<Leaf> = cursor.advance(|l: &Leaf| l.0 == 1).unwrap();
        leaf.0 = 2;
        let root = cursor.replace_current(leaf).unwrap();

        assert_eq!(root.seq(), 1);
        assert_eq!(node.latest_root(&identity).unwrap().seq(), 1);
        let reader = node.open_reader(&identity).unwrap();
        assert!(reader.advance(|l: &Leaf| l.0 == 2).is_ok());
        assert!(reader.advance(|l: &Leaf| l.0 == 1).is_err());
    }

    #[test]
    fn test_replace_nested_rewrites_ancestors() {
        let (node, keypair, identity) = setup();
        let before = node.latest_root(&identity).unwrap();
        let mut cursor = node.open_cursor_on_latest_root(&identity, &keypair).unwrap();

        let mut leaf: ContainerHandle<Leaf> = cursor.advance(|l: &Leaf| l.0 == 7).unwrap();
        leaf.0 = 8;
        let after = cursor.replace_current(leaf).unwrap();

        assert_eq!(before.refs()[0], after.refs()[0]);
        assert_ne!(before.refs()[1], after.refs()[1]);
        let reader = node.open_reader(&identity).unwrap();
        assert_eq!(reader.advance(|l: &Leaf| l.0 == 8).unwrap().depth(), 2);
    }

    #[test]
    fn test_stale_cursor_rejected() {
        let (node, keypair, identity) = setup();
        let mut first = node.open_cursor_on_latest_root(&identity, &keypair).unwrap();
        let mut second = node.open_cursor_on_latest_root(&identity, &keypair).unwrap();

        let mut a: ContainerHandle<Leaf> = first.advance(|l: &Leaf| l.0 == 1).unwrap();
        a.0 = 10;
        first.replace_current(a).unwrap();

        let mut b: ContainerHandle<Leaf> = second.advance(|l: &Leaf| l.0 == 1).unwrap();
        b.0 = 20;
        assert!(matches!(
            second.replace_current(b),
            Err(PqbbsError::TransactionFailed(_))
        ));
        assert_eq!(node.latest_root(&identity).unwrap().seq(), 1);
    }

    #[test]
    fn test_reader_cannot_replace() {
        let (node, _, identity) = setup();
        let mut reader = node.open_reader(&identity).unwrap();
        let leaf: ContainerHandle<Leaf> = reader.advance(|_: &Leaf| true).unwrap();

        assert!(matches!(
            reader.replace_current(leaf),
            Err(PqbbsError::NotMaster(_))
        ));
    }

    #[test]
    fn test_cursor_requires_owner_key() {
        let (node, _, identity) = setup();
        let other = KeyPair::generate_mldsa87().unwrap();

        assert!(matches!(
            node.open_cursor_on_latest_root(&identity, &other),
            Err(PqbbsError::NotMaster(_))
        ));
    }

    #[test]
    fn test_accept_root_from_peer() {
        let (master, keypair, identity) = setup();
        let mut cursor = master.open_cursor_on_latest_root(&identity, &keypair).unwrap();
        let mut leaf: ContainerHandle<Leaf> = cursor.advance(|l: &Leaf| l.0 == 7).unwrap();
        leaf.0 = 70;
        let root = cursor.replace_current(leaf).unwrap();

        // A peer with an empty cache cannot fill without a remote.
        let empty: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let peer = GraphNode::<TestObject>::new(empty, Arc::new(Offline)).unwrap();
        assert!(matches!(
            peer.accept_root(root.clone()),
            Err(PqbbsError::TransactionFailed(_))
        ));
        assert!(peer.latest_root(&identity).is_none());

        // The master itself already holds everything.
        assert!(master.accept_root(root).is_err());
    }
}
