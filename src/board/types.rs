//! Content types stored in a board's graph.
//!
//! ```text
//! RootSnapshot
//!   ├── Board
//!   ├── BoardThreads ──────────► Thread, Thread, ...
//!   ├── ThreadVotesContainer ──► VoteRefs { target: thread } ──► Vote, ...
//!   ├── PostVotesContainer ────► VoteRefs { target: post } ────► Vote, ...
//!   └── ThreadPagesContainer ──► ThreadPage { thread } ────────► Post, ...
//! ```
//!
//! Threads, posts and votes are leaves: immutable and never edited in place.
//! The containers are rewritten (as new objects) on every mutation.

use crate::error::{PqbbsError, Result};
use crate::graph::{current_timestamp_millis, Identity, Reference};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum board name size (256 bytes).
pub const MAX_NAME_SIZE: usize = 256;

/// Maximum board URL size (2KB).
pub const MAX_URL_SIZE: usize = 2 * 1024;

/// Maximum thread title size (512 bytes).
pub const MAX_THREAD_TITLE_SIZE: usize = 512;

/// Maximum thread body size (100KB).
pub const MAX_THREAD_BODY_SIZE: usize = 100 * 1024;

/// Maximum post body size (100KB).
pub const MAX_POST_BODY_SIZE: usize = 100 * 1024;

/// Maximum length of a vote tag (64 bytes).
pub const MAX_VOTE_TAG_SIZE: usize = 64;

fn check_size(what: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(PqbbsError::validation(format!(
            "{} exceeds maximum size of {} bytes",
            what, max
        )));
    }
    Ok(())
}

/// Board metadata. The first child of every root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Display name.
    pub name: String,
    /// Where the board is served from.
    pub url: String,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at: u64,
}

impl Board {
    /// Creates board metadata.
    ///
    /// # Errors
    /// Returns an error if the name is empty or either field is oversized.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let url = url.into();
        if name.is_empty() {
            return Err(PqbbsError::validation("Board name cannot be empty"));
        }
        check_size("Board name", &name, MAX_NAME_SIZE)?;
        check_size("Board URL", &url, MAX_URL_SIZE)?;
        Ok(Self {
            name,
            url,
            created_at: current_timestamp_millis(),
        })
    }
}

/// Ordered index of a board's threads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardThreads {
    /// Thread references in injection order.
    pub threads: Vec<Reference>,
}

/// A discussion thread.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub title: String,
    pub body: String,
    pub author: Identity,
    pub created_at: u64,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("title", &self.title)
            .field("body_len", &self.body.len())
            .field("author", &self.author)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Thread {
    /// Creates a thread.
    ///
    /// # Errors
    /// Returns an error if the title is empty or either field is oversized.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        author: Identity,
    ) -> Result<Self> {
        let title = title.into();
        let body = body.into();
        if title.is_empty() {
            return Err(PqbbsError::validation("Thread title cannot be empty"));
        }
        check_size("Thread title", &title, MAX_THREAD_TITLE_SIZE)?;
        check_size("Thread body", &body, MAX_THREAD_BODY_SIZE)?;
        Ok(Self {
            title,
            body,
            author,
            created_at: current_timestamp_millis(),
        })
    }
}

/// A reply within a thread.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Thread this post replies to.
    pub thread: Reference,
    pub body: String,
    pub author: Identity,
    pub created_at: u64,
}

impl fmt::Debug for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Post")
            .field("thread", &self.thread)
            .field("body_len", &self.body.len())
            .field("author", &self.author)
            .finish()
    }
}

impl Post {
    /// Creates a post replying to `thread`.
    pub fn new(thread: Reference, body: impl Into<String>, author: Identity) -> Result<Self> {
        let body = body.into();
        if body.is_empty() {
            return Err(PqbbsError::validation("Post body cannot be empty"));
        }
        check_size("Post body", &body, MAX_POST_BODY_SIZE)?;
        Ok(Self {
            thread,
            body,
            author,
            created_at: current_timestamp_millis(),
        })
    }
}

/// One identity's vote on a thread or post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Identity,
    /// Vote weight, usually +1 or -1.
    pub value: i8,
    /// Free-form label (for example a reaction name). May be empty.
    pub tag: String,
    pub created_at: u64,
}

impl Vote {
    /// Creates a vote without a tag.
    pub fn new(voter: Identity, value: i8) -> Self {
        Self {
            voter,
            value,
            tag: String::new(),
            created_at: current_timestamp_millis(),
        }
    }

    /// Creates a tagged vote.
    pub fn tagged(voter: Identity, value: i8, tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        check_size("Vote tag", &tag, MAX_VOTE_TAG_SIZE)?;
        Ok(Self {
            tag,
            ..Self::new(voter, value)
        })
    }
}

/// The votes held for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRefs {
    /// The thread or post voted on.
    pub target: Reference,
    /// At most one vote per voter.
    pub votes: Vec<Reference>,
}

impl VoteRefs {
    pub fn new(target: Reference) -> Self {
        Self {
            target,
            votes: Vec::new(),
        }
    }
}

/// Votes on threads, keyed by thread reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadVotesContainer {
    pub entries: Vec<VoteRefs>,
}

/// Votes on posts, keyed by post reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostVotesContainer {
    pub entries: Vec<VoteRefs>,
}

/// The posts of one thread, in injection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPage {
    pub thread: Reference,
    pub posts: Vec<Reference>,
}

/// All thread pages of a board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadPagesContainer {
    pub pages: Vec<ThreadPage>,
}

impl ThreadPagesContainer {
    /// Returns the page for `thread`, creating an empty one if needed.
    pub fn page_mut(&mut self, thread: Reference) -> &mut ThreadPage {
        let index = match self.pages.iter().position(|p| p.thread == thread) {
            Some(index) => index,
            None => {
                self.pages.push(ThreadPage {
                    thread,
                    posts: Vec::new(),
                });
                self.pages.len() - 1
            }
        };
        &mut self.pages[index]
    }

    /// Returns the post references of `thread`, empty if it has none.
    pub fn posts_of(&self, thread: &Reference) -> &[Reference] {
        self.pages
            .iter()
            .find(|p| &p.thread == thread)
            .map(|p| p.posts.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::from_bytes([7u8; 64])
    }

    #[test]
    fn test_board_validation() {
        assert!(Board::new("general", "https://bbs.example").is_ok());
        assert!(Board::new("", "https://bbs.example").is_err());
        assert!(Board::new("x".repeat(MAX_NAME_SIZE + 1), "").is_err());
    }

    #[test]
    fn test_thread_validation() {
        assert!(Thread::new("Hello", "", identity()).is_ok());
        assert!(Thread::new("", "body", identity()).is_err());
        assert!(Thread::new("t", "b".repeat(MAX_THREAD_BODY_SIZE + 1), identity()).is_err());
    }

    #[test]
    fn test_post_rejects_empty_body() {
        let thread = Reference::of_bytes(b"thread");
        assert!(Post::new(thread, "", identity()).is_err());
        assert_eq!(Post::new(thread, "hi", identity()).unwrap().thread, thread);
    }

    #[test]
    fn test_vote_tag_limit() {
        assert!(Vote::tagged(identity(), 1, "like").is_ok());
        assert!(Vote::tagged(identity(), 1, "x".repeat(MAX_VOTE_TAG_SIZE + 1)).is_err());
    }

    #[test]
    fn test_page_mut_creates_once() {
        let thread = Reference::of_bytes(b"thread");
        let mut pages = ThreadPagesContainer::default();
        pages.page_mut(thread).posts.push(Reference::of_bytes(b"p1"));
        pages.page_mut(thread).posts.push(Reference::of_bytes(b"p2"));

        assert_eq!(pages.pages.len(), 1);
        assert_eq!(pages.posts_of(&thread).len(), 2);
        assert!(pages.posts_of(&Reference::of_bytes(b"other")).is_empty());
    }
}
