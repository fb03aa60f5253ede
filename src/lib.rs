//! # PQBBS - Post-Quantum Bulletin Board System
//!
//! The mutation and synchronization core of a distributed bulletin board.
//! Boards, threads, posts and votes live in a content-addressed object graph.
//! Each board's graph hangs off a root signed by the board owner with
//! ML-DSA-87. The owner changes a board by publishing a new root, and
//! subscribers replicate it.
//!
//! ## Features
//!
//! - **Atomic publish**: every mutation is one root replacement; readers see
//!   either the old or the new graph, never a mix
//! - **One vote per identity**: re-voting replaces, withdrawing removes
//! - **Per-board locking**: mutations of different boards run in parallel
//! - **Fill on replace**: no root becomes current while it references an
//!   object the node cannot resolve
//! - **Persistence**: objects, roots and the board registry in RocksDB
//!
//! ## Example
//!
//! ```rust,no_run
//! use pqbbs::board::{Board, BoardConfig, BoardCore, LocalTransport, Thread, Vote};
//! use pqbbs::crypto::KeyPair;
//! use std::sync::Arc;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let core = BoardCore::in_memory(Arc::new(LocalTransport::new()))?;
//! let keypair = KeyPair::generate_mldsa87()?;
//! let board = core.inject_board(BoardConfig::master(keypair), Board::new("general", "")?)?;
//!
//! let thread = core.inject_thread(&board, Thread::new("Hello", "first post", board)?)?;
//! core.add_vote_for_thread(&board, thread, Vote::new(board, 1))?;
//! assert_eq!(core.get_votes_for_thread(&board, &thread)?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod graph;
pub mod storage;

mod locking;

pub use error::{PqbbsError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
