//! Bulletin boards on top of the object graph.
//!
//! A board is owned by the holder of one ML-DSA-87 key (its master) and
//! followed by any number of subscribers. Only the master replaces the board's
//! root; subscribers receive the new roots and fill in the objects they lack.
//!
//! ## Components
//!
//! - [`types`]: the stored content (board, threads, posts, votes, containers)
//! - [`BoardObject`]: the graph object enum tying them together
//! - `votes`: one-vote-per-identity containers for threads and posts
//! - `threads`: thread and post injection, read paths
//! - [`BoardRegistry`]: known boards and the role this node plays in each
//! - [`SubscriptionManager`]: registry and transport kept consistent
//! - [`BoardLocks`]: one mutation lock per board
//! - [`BoardCore`]: the facade

pub mod locks;
mod manager;
mod object;
pub mod registry;
pub mod subscription;
mod threads;
pub mod types;
mod votes;

pub use locks::BoardLocks;
pub use manager::BoardCore;
pub use object::BoardObject;
pub use registry::{BoardConfig, BoardRegistry};
pub use subscription::{LocalTransport, SubscriptionManager, Transport};
pub use types::{Board, BoardThreads, Post, Thread, Vote};
pub use votes::VotesContainer;
