//! The board operations the presentation layer calls.
//!
//! Every mutation runs under its board's lock, resolves the current root,
//! changes one container and publishes one new root. Reads resolve one root
//! snapshot and take no lock.

use crate::board::locks::BoardLocks;
use crate::board::object::BoardObject;
use crate::board::registry::{BoardConfig, BoardRegistry, CF_BOARDS};
use crate::board::subscription::{SubscriptionManager, Transport};
use crate::board::threads;
use crate::board::types::{
    Board, BoardThreads, Post, PostVotesContainer, Thread, ThreadPagesContainer,
    ThreadVotesContainer, Vote,
};
use crate::board::votes::{self, VotesContainer};
use crate::config::NodeConfig;
use crate::error::{PqbbsError, Result};
use crate::graph::{
    Cursor, FillReport, GraphNode, Identity, MemoryObjectStore, ObjectStore, Reference, Remote,
    RocksObjectStore, RootSnapshot, Typed, CF_OBJECTS, CF_ROOTS,
};
use crate::storage::RocksDbHandle;
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

/// A bulletin-board node.
pub struct BoardCore<T: Transport> {
    graph: GraphNode<BoardObject>,
    registry: Arc<BoardRegistry>,
    subscriptions: SubscriptionManager<T>,
    locks: BoardLocks,
    transport: Arc<T>,
}

impl<T: Transport> std::fmt::Debug for BoardCore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardCore")
            .field("boards", &self.registry.len())
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> BoardCore<T> {
    /// Assembles a node from its parts and re-subscribes every registered
    /// board.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: BoardRegistry,
        transport: Arc<T>,
    ) -> Result<Self> {
        let remote: Arc<dyn Remote> = transport.clone();
        let graph = GraphNode::new(store, remote)?;
        let registry = Arc::new(registry);
        let subscriptions = SubscriptionManager::new(registry.clone(), transport.clone());

        if !registry.is_empty() {
            subscriptions.resubscribe_all();
        }

        Ok(Self {
            graph,
            registry,
            subscriptions,
            locks: BoardLocks::new(),
            transport,
        })
    }

    /// A node that keeps everything in memory.
    pub fn in_memory(transport: Arc<T>) -> Result<Self> {
        Self::new(
            Arc::new(MemoryObjectStore::new()),
            BoardRegistry::new(),
            transport,
        )
    }

    /// Opens a node as configured: in memory, or persistent under the data
    /// directory (objects, roots and registry share one RocksDB).
    pub fn open(config: &NodeConfig, transport: Arc<T>) -> Result<Self> {
        let Some(path) = config.db_path() else {
            return Self::in_memory(transport);
        };
        fs::create_dir_all(&path)?;

        let db = RocksDbHandle::open(&path, &config.rocksdb, &[CF_OBJECTS, CF_ROOTS, CF_BOARDS])?;
        let registry = BoardRegistry::open(db.clone())?;
        info!(path = %path.display(), boards = registry.len(), "node opened");
        Self::new(Arc::new(RocksObjectStore::new(db)), registry, transport)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Runs `f` on a signing cursor at the board's latest root, holding the
    /// board lock throughout.
    fn mutate<R>(
        &self,
        board: &Identity,
        f: impl FnOnce(&mut Cursor<'_, BoardObject>) -> Result<R>,
    ) -> Result<R> {
        self.locks.with_board(board, || {
            let config = self.registry.get_config(board).ok_or_else(|| {
                PqbbsError::not_master(format!("board {} is not registered", board))
            })?;
            let keypair = config.signing_key()?;
            let mut cursor = self.graph.open_cursor_on_latest_root(board, keypair)?;
            f(&mut cursor)
        })
    }

    /// Drops the root of a board whose injection failed. A failed discard is
    /// logged so the caller still sees the original error.
    fn roll_back_injection(&self, identity: &Identity, cause: &PqbbsError) {
        warn!(board = %identity, error = %cause, "board injection rolled back");
        if let Err(e) = self.graph.discard_root(identity) {
            warn!(board = %identity, error = %e, "failed to discard root of rolled back board");
        }
    }

    fn add_vote<C: VotesContainer>(
        &self,
        board: &Identity,
        target: Reference,
        vote: Vote,
    ) -> Result<()> {
        self.mutate(board, |cursor| votes::add_vote::<C>(cursor, target, vote))
            .map(|_| ())
    }

    fn remove_vote<C: VotesContainer>(
        &self,
        voter: &Identity,
        board: &Identity,
        target: &Reference,
    ) -> Result<bool> {
        self.mutate(board, |cursor| votes::remove_vote::<C>(cursor, voter, target))
            .map(|root| root.is_some())
    }

    fn list_votes<C: VotesContainer>(
        &self,
        board: &Identity,
        target: &Reference,
    ) -> Result<Vec<Vote>> {
        let reader = self.graph.open_reader(board)?;
        votes::list_votes::<C>(&reader, target)
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Records `vote` on a thread, replacing the voter's earlier vote.
    pub fn add_vote_for_thread(
        &self,
        board: &Identity,
        thread: Reference,
        vote: Vote,
    ) -> Result<()> {
        self.add_vote::<ThreadVotesContainer>(board, thread, vote)
    }

    /// Records `vote` on a post, replacing the voter's earlier vote.
    pub fn add_vote_for_post(&self, board: &Identity, post: Reference, vote: Vote) -> Result<()> {
        self.add_vote::<PostVotesContainer>(board, post, vote)
    }

    /// Removes `voter`'s vote on a thread. Returns false (and publishes
    /// nothing) if there was none.
    pub fn remove_vote_for_thread(
        &self,
        voter: &Identity,
        board: &Identity,
        thread: &Reference,
    ) -> Result<bool> {
        self.remove_vote::<ThreadVotesContainer>(voter, board, thread)
    }

    /// Removes `voter`'s vote on a post. Returns false (and publishes
    /// nothing) if there was none.
    pub fn remove_vote_for_post(
        &self,
        voter: &Identity,
        board: &Identity,
        post: &Reference,
    ) -> Result<bool> {
        self.remove_vote::<PostVotesContainer>(voter, board, post)
    }

    pub fn get_votes_for_thread(&self, board: &Identity, thread: &Reference) -> Result<Vec<Vote>> {
        self.list_votes::<ThreadVotesContainer>(board, thread)
    }

    pub fn get_votes_for_post(&self, board: &Identity, post: &Reference) -> Result<Vec<Vote>> {
        self.list_votes::<PostVotesContainer>(board, post)
    }

    // =========================================================================
    // Threads and posts
    // =========================================================================

    /// Appends a thread to a master board. Returns the thread's reference.
    pub fn inject_thread(&self, board: &Identity, thread: Thread) -> Result<Reference> {
        self.mutate(board, |cursor| threads::inject_thread(cursor, thread))
            .map(|(reference, _)| reference)
    }

    /// Appends a post to one of a master board's threads. Returns the post's
    /// reference.
    pub fn inject_post(&self, board: &Identity, post: Post) -> Result<Reference> {
        self.mutate(board, |cursor| threads::inject_post(cursor, post))
            .map(|(reference, _)| reference)
    }

    pub fn get_board(&self, board: &Identity) -> Result<Board> {
        threads::get_board(&self.graph.open_reader(board)?)
    }

    pub fn get_threads(&self, board: &Identity) -> Result<Vec<(Reference, Thread)>> {
        threads::get_threads(&self.graph.open_reader(board)?)
    }

    pub fn get_posts(
        &self,
        board: &Identity,
        thread: &Reference,
    ) -> Result<Vec<(Reference, Post)>> {
        threads::get_posts(&self.graph.open_reader(board)?, thread)
    }

    // =========================================================================
    // Board lifecycle
    // =========================================================================

    /// Creates and publishes a board this node is master of.
    ///
    /// The initial root is published and the node subscribes to it before the
    /// configuration is registered. A refused subscription discards the root
    /// and leaves nothing registered.
    ///
    /// # Errors
    /// `NotMaster` without a signing key, `AlreadyExists` for a known
    /// identity, `SubscriptionFailed` if the transport refuses.
    pub fn inject_board(&self, config: BoardConfig, board: Board) -> Result<Identity> {
        let identity = *config.identity();
        let keypair = config.signing_key()?.clone();

        self.locks.with_board(&identity, || {
            if self.registry.has_config(&identity) {
                return Err(PqbbsError::already_exists(format!(
                    "board {} is already registered",
                    identity
                )));
            }

            let children = [
                board.into_object(),
                BoardThreads::default().into_object(),
                ThreadVotesContainer::default().into_object(),
                PostVotesContainer::default().into_object(),
                ThreadPagesContainer::default().into_object(),
            ];
            let root = self
                .graph
                .execute_transaction(|txn| txn.new_root(&keypair, &children))
                .map_err(|e| e.in_transaction("Failed to create board root"))?;

            if let Err(e) = self.subscriptions.subscribe_transport(&identity) {
                self.roll_back_injection(&identity, &e);
                return Err(e);
            }
            if let Err(e) = self.registry.add_config(config) {
                if !self.transport.unsubscribe(&identity) {
                    warn!(board = %identity, "transport refused unsubscribe during rollback");
                }
                self.roll_back_injection(&identity, &e);
                return Err(e.in_transaction("Failed to register board"));
            }

            self.transport.announce_root(&root);
            info!(board = %identity, "board injected");
            Ok(identity)
        })
    }

    /// Follows someone else's board.
    pub fn subscribe_to_board(&self, identity: &Identity) -> Result<BoardConfig> {
        self.locks
            .with_board(identity, || self.subscriptions.subscribe_to_board(identity))
    }

    /// Stops following a board and drops its local root.
    pub fn unsubscribe_from_board(&self, identity: &Identity) -> Result<()> {
        self.locks.with_board(identity, || {
            let result = self.subscriptions.unsubscribe_from_board(identity);
            self.graph
                .discard_root(identity)
                .map_err(|e| e.in_transaction("Failed to discard board root"))?;
            result
        })
    }

    /// Accepts a root published by the owner of a registered board.
    ///
    /// # Errors
    /// `NotFound` for boards this node does not follow, `Corrupt` for roots
    /// that fail verification, `TransactionFailed` for stale or unfillable
    /// roots.
    pub fn receive_root(&self, root: RootSnapshot) -> Result<FillReport> {
        let identity = *root.identity();
        self.locks.with_board(&identity, || {
            if !self.registry.has_config(&identity) {
                return Err(PqbbsError::not_found(format!(
                    "board {} is not registered",
                    identity
                )));
            }
            let report = self
                .graph
                .accept_root(root)
                .map_err(|e| e.in_transaction("Failed to accept root"))?;
            info!(
                board = %identity,
                fetched = report.fetched,
                reachable = report.reachable,
                "root received"
            );
            Ok(report)
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn list_boards(&self) -> Vec<BoardConfig> {
        self.registry.list()
    }

    pub fn board_config(&self, identity: &Identity) -> Option<BoardConfig> {
        self.registry.get_config(identity)
    }

    pub fn latest_root(&self, identity: &Identity) -> Option<RootSnapshot> {
        self.graph.latest_root(identity)
    }

    pub fn graph(&self) -> &GraphNode<BoardObject> {
        &self.graph
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::subscription::LocalTransport;
    use crate::crypto::KeyPair;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes and root deletions can be made to fail.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryObjectStore,
        fail_writes: AtomicBool,
        fail_deletes: AtomicBool,
    }

    impl ObjectStore for FailingStore {
        fn put_object(&self, reference: &Reference, bytes: &[u8]) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PqbbsError::storage("disk full"));
            }
            self.inner.put_object(reference, bytes)
        }

        fn get_object(&self, reference: &Reference) -> Result<Option<Vec<u8>>> {
            self.inner.get_object(reference)
        }

        fn contains_object(&self, reference: &Reference) -> Result<bool> {
            self.inner.contains_object(reference)
        }

        fn save_root(&self, root: &RootSnapshot) -> Result<()> {
            self.inner.save_root(root)
        }

        fn delete_root(&self, identity: &Identity) -> Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(PqbbsError::storage("read-only filesystem"));
            }
            self.inner.delete_root(identity)
        }

        fn load_roots(&self) -> Result<Vec<RootSnapshot>> {
            self.inner.load_roots()
        }
    }

    fn failing_core() -> (BoardCore<LocalTransport>, Arc<FailingStore>, Arc<LocalTransport>) {
        let store = Arc::new(FailingStore::default());
        let transport = Arc::new(LocalTransport::new());
        let core = BoardCore::new(store.clone(), BoardRegistry::new(), transport.clone()).unwrap();
        (core, store, transport)
    }

    fn setup() -> (BoardCore<LocalTransport>, Arc<LocalTransport>, Identity) {
        let transport = Arc::new(LocalTransport::new());
        let core = BoardCore::in_memory(transport.clone()).unwrap();
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let identity = core
            .inject_board(
                BoardConfig::master(keypair),
                Board::new("general", "https://bbs.example").unwrap(),
            )
            .unwrap();
        (core, transport, identity)
    }

    fn voter(byte: u8) -> Identity {
        Identity::from_bytes([byte; 64])
    }

    #[test]
    fn test_inject_board_publishes_seq_zero() {
        let (core, transport, identity) = setup();

        let root = core.latest_root(&identity).unwrap();
        assert_eq!(root.seq(), 0);
        assert_eq!(root.refs().len(), 5);
        assert!(transport.is_subscribed(&identity));
        assert!(core.board_config(&identity).unwrap().is_master());
        assert_eq!(core.get_board(&identity).unwrap().name, "general");
        assert!(core.get_threads(&identity).unwrap().is_empty());
    }

    #[test]
    fn test_inject_board_without_key() {
        let core = BoardCore::in_memory(Arc::new(LocalTransport::new())).unwrap();
        let identity = voter(1);

        let result = core.inject_board(
            BoardConfig::subscriber(identity),
            Board::new("b", "").unwrap(),
        );
        assert!(matches!(result, Err(PqbbsError::NotMaster(_))));
        assert!(core.board_config(&identity).is_none());
    }

    #[test]
    fn test_inject_board_subscription_refused() {
        let transport = Arc::new(LocalTransport::new());
        let core = BoardCore::in_memory(transport.clone()).unwrap();
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let identity = Identity::of_key(keypair.public_key());
        transport.set_online(false);

        let result = core.inject_board(BoardConfig::master(keypair), Board::new("b", "").unwrap());
        assert!(matches!(result, Err(PqbbsError::SubscriptionFailed(_))));
        assert!(core.board_config(&identity).is_none());
        assert!(core.latest_root(&identity).is_none());
    }

    #[test]
    fn test_vote_on_subscribed_board_is_not_master() {
        let (core, _, _) = setup();
        let other = voter(9);
        core.subscribe_to_board(&other).unwrap();

        let result =
            core.add_vote_for_thread(&other, Reference::of_bytes(b"t"), Vote::new(voter(1), 1));
        assert!(matches!(result, Err(PqbbsError::NotMaster(_))));
    }

    #[test]
    fn test_remove_absent_vote_publishes_nothing() {
        let (core, _, identity) = setup();
        let thread = core
            .inject_thread(&identity, Thread::new("t", "", identity).unwrap())
            .unwrap();
        let seq = core.latest_root(&identity).unwrap().seq();

        assert!(!core.remove_vote_for_thread(&voter(1), &identity, &thread).unwrap());
        assert_eq!(core.latest_root(&identity).unwrap().seq(), seq);
    }

    #[test]
    fn test_post_votes_are_separate_from_thread_votes() {
        let (core, _, identity) = setup();
        let thread = core
            .inject_thread(&identity, Thread::new("t", "", identity).unwrap())
            .unwrap();
        let post = core
            .inject_post(&identity, Post::new(thread, "reply", identity).unwrap())
            .unwrap();

        core.add_vote_for_post(&identity, post, Vote::new(voter(1), 1)).unwrap();
        assert_eq!(core.get_votes_for_post(&identity, &post).unwrap().len(), 1);
        assert!(core.get_votes_for_thread(&identity, &post).unwrap().is_empty());
    }

    #[test]
    fn test_inject_post_unknown_thread() {
        let (core, _, identity) = setup();
        let result = core.inject_post(
            &identity,
            Post::new(Reference::of_bytes(b"nope"), "reply", identity).unwrap(),
        );
        assert!(matches!(result, Err(PqbbsError::NotFound(_))));
    }

    #[test]
    fn test_receive_root_requires_registration() {
        let (master, _, identity) = setup();
        let root = master.latest_root(&identity).unwrap();
        let stranger = BoardCore::in_memory(Arc::new(LocalTransport::new())).unwrap();

        assert!(matches!(
            stranger.receive_root(root),
            Err(PqbbsError::NotFound(_))
        ));
    }

    #[test]
    fn test_unsubscribe_drops_root() {
        let (core, transport, identity) = setup();
        core.unsubscribe_from_board(&identity).unwrap();

        assert!(core.board_config(&identity).is_none());
        assert!(core.latest_root(&identity).is_none());
        assert!(!transport.is_subscribed(&identity));
    }

    #[test]
    fn test_receive_root_after_unsubscribe_is_rejected() {
        let (master, _, identity) = setup();
        let follower = BoardCore::in_memory(Arc::new(LocalTransport::new())).unwrap();
        follower.subscribe_to_board(&identity).unwrap();
        follower.unsubscribe_from_board(&identity).unwrap();

        let root = master.latest_root(&identity).unwrap();
        assert!(matches!(
            follower.receive_root(root),
            Err(PqbbsError::NotFound(_))
        ));
        assert!(follower.latest_root(&identity).is_none());
        assert!(follower.board_config(&identity).is_none());
    }

    #[test]
    fn test_store_write_failure_is_transaction_failed() {
        let (core, store, _) = failing_core();
        let identity = core
            .inject_board(
                BoardConfig::master(KeyPair::generate_mldsa87().unwrap()),
                Board::new("general", "").unwrap(),
            )
            .unwrap();
        let thread = core
            .inject_thread(&identity, Thread::new("t", "", identity).unwrap())
            .unwrap();
        let seq = core.latest_root(&identity).unwrap().seq();
        store.fail_writes.store(true, Ordering::SeqCst);

        let vote = core.add_vote_for_thread(&identity, thread, Vote::new(voter(1), 1));
        assert!(matches!(vote, Err(PqbbsError::TransactionFailed(_))));

        let thread = core.inject_thread(&identity, Thread::new("t2", "", identity).unwrap());
        assert!(matches!(thread, Err(PqbbsError::TransactionFailed(_))));

        let injected = core.inject_board(
            BoardConfig::master(KeyPair::generate_mldsa87().unwrap()),
            Board::new("other", "").unwrap(),
        );
        assert!(matches!(injected, Err(PqbbsError::TransactionFailed(_))));
        assert_eq!(core.latest_root(&identity).unwrap().seq(), seq);
    }

    #[test]
    fn test_failed_discard_keeps_original_error() {
        let (core, store, transport) = failing_core();
        let keypair = KeyPair::generate_mldsa87().unwrap();
        let identity = Identity::of_key(keypair.public_key());
        store.fail_deletes.store(true, Ordering::SeqCst);
        transport.set_online(false);

        let result = core.inject_board(BoardConfig::master(keypair), Board::new("b", "").unwrap());
        assert!(matches!(result, Err(PqbbsError::SubscriptionFailed(_))));
        assert!(core.board_config(&identity).is_none());
    }

    #[test]
    fn test_unsubscribe_discard_failure_is_transaction_failed() {
        let (core, store, _) = failing_core();
        let identity = core
            .inject_board(
                BoardConfig::master(KeyPair::generate_mldsa87().unwrap()),
                Board::new("general", "").unwrap(),
            )
            .unwrap();
        store.fail_deletes.store(true, Ordering::SeqCst);

        assert!(matches!(
            core.unsubscribe_from_board(&identity),
            Err(PqbbsError::TransactionFailed(_))
        ));
        assert!(core.board_config(&identity).is_none());
    }
}
