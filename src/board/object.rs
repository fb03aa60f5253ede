//! The storable object enum of a board graph.

use crate::board::types::{
    Board, BoardThreads, Post, PostVotesContainer, Thread, ThreadPagesContainer,
    ThreadVotesContainer, Vote,
};
use crate::error::{PqbbsError, Result};
use crate::graph::{flat_slot_mut, GraphObject, Reference, Typed};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every object that can hang off a board root.
#[derive(Clone, Serialize, Deserialize)]
pub enum BoardObject {
    Board(Board),
    BoardThreads(BoardThreads),
    Thread(Thread),
    Post(Post),
    Vote(Vote),
    ThreadVotes(ThreadVotesContainer),
    PostVotes(PostVotesContainer),
    ThreadPages(ThreadPagesContainer),
}

impl fmt::Debug for BoardObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardObject::Board(b) => f
                .debug_struct("BoardObject::Board")
                .field("name", &b.name)
                .finish(),
            BoardObject::BoardThreads(t) => f
                .debug_struct("BoardObject::BoardThreads")
                .field("threads", &t.threads.len())
                .finish(),
            BoardObject::Thread(t) => f
                .debug_struct("BoardObject::Thread")
                .field("title", &t.title)
                .finish(),
            BoardObject::Post(p) => f
                .debug_struct("BoardObject::Post")
                .field("thread", &p.thread)
                .finish(),
            BoardObject::Vote(v) => f
                .debug_struct("BoardObject::Vote")
                .field("voter", &v.voter)
                .field("value", &v.value)
                .finish(),
            BoardObject::ThreadVotes(c) => f
                .debug_struct("BoardObject::ThreadVotes")
                .field("targets", &c.entries.len())
                .finish(),
            BoardObject::PostVotes(c) => f
                .debug_struct("BoardObject::PostVotes")
                .field("targets", &c.entries.len())
                .finish(),
            BoardObject::ThreadPages(c) => f
                .debug_struct("BoardObject::ThreadPages")
                .field("pages", &c.pages.len())
                .finish(),
        }
    }
}

impl GraphObject for BoardObject {
    fn type_name(&self) -> &'static str {
        match self {
            BoardObject::Board(_) => Board::TYPE_NAME,
            BoardObject::BoardThreads(_) => BoardThreads::TYPE_NAME,
            BoardObject::Thread(_) => Thread::TYPE_NAME,
            BoardObject::Post(_) => Post::TYPE_NAME,
            BoardObject::Vote(_) => Vote::TYPE_NAME,
            BoardObject::ThreadVotes(_) => ThreadVotesContainer::TYPE_NAME,
            BoardObject::PostVotes(_) => PostVotesContainer::TYPE_NAME,
            BoardObject::ThreadPages(_) => ThreadPagesContainer::TYPE_NAME,
        }
    }

    // `Post::thread` and `VoteRefs::target` point sideways, not down, and are
    // not children.
    fn child_refs(&self) -> Vec<Reference> {
        match self {
            BoardObject::BoardThreads(t) => t.threads.clone(),
            BoardObject::ThreadVotes(c) => {
                c.entries.iter().flat_map(|e| e.votes.iter().copied()).collect()
            }
            BoardObject::PostVotes(c) => {
                c.entries.iter().flat_map(|e| e.votes.iter().copied()).collect()
            }
            BoardObject::ThreadPages(c) => {
                c.pages.iter().flat_map(|p| p.posts.iter().copied()).collect()
            }
            BoardObject::Board(_)
            | BoardObject::Thread(_)
            | BoardObject::Post(_)
            | BoardObject::Vote(_) => Vec::new(),
        }
    }

    fn replace_child_ref(&mut self, index: usize, reference: Reference) -> Result<()> {
        let kind = self.type_name();
        let slot = match self {
            BoardObject::BoardThreads(t) => t.threads.get_mut(index),
            BoardObject::ThreadVotes(c) => {
                flat_slot_mut(c.entries.iter_mut().map(|e| &mut e.votes), index)
            }
            BoardObject::PostVotes(c) => {
                flat_slot_mut(c.entries.iter_mut().map(|e| &mut e.votes), index)
            }
            BoardObject::ThreadPages(c) => {
                flat_slot_mut(c.pages.iter_mut().map(|p| &mut p.posts), index)
            }
            BoardObject::Board(_)
            | BoardObject::Thread(_)
            | BoardObject::Post(_)
            | BoardObject::Vote(_) => None,
        };
        let slot = slot.ok_or_else(|| {
            PqbbsError::validation(format!("{} has no child slot {}", kind, index))
        })?;
        *slot = reference;
        Ok(())
    }
}

macro_rules! typed_variant {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl Typed<BoardObject> for $ty {
            const TYPE_NAME: &'static str = $name;

            fn into_object(self) -> BoardObject {
                BoardObject::$variant(self)
            }

            fn from_object(object: BoardObject) -> Option<Self> {
                match object {
                    BoardObject::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

typed_variant!(Board, Board, "Board");
typed_variant!(BoardThreads, BoardThreads, "BoardThreads");
typed_variant!(Thread, Thread, "Thread");
typed_variant!(Post, Post, "Post");
typed_variant!(Vote, Vote, "Vote");
typed_variant!(ThreadVotesContainer, ThreadVotes, "ThreadVotesContainer");
typed_variant!(PostVotesContainer, PostVotes, "PostVotesContainer");
typed_variant!(ThreadPagesContainer, ThreadPages, "ThreadPagesContainer");
