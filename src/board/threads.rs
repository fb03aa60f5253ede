//! Thread and post injection, and the board read paths.

use crate::board::object::BoardObject;
use crate::board::types::{Board, BoardThreads, Post, Thread, ThreadPagesContainer};
use crate::error::{PqbbsError, Result};
use crate::graph::{Cursor, Reference, RootSnapshot};
use tracing::debug;

/// Appends `thread` to the board's thread index.
///
/// No deduplication: identical content yields the same reference, appended
/// again.
pub(crate) fn inject_thread(
    cursor: &mut Cursor<'_, BoardObject>,
    thread: Thread,
) -> Result<(Reference, RootSnapshot)> {
    let mut index = cursor.advance(|_: &BoardThreads| true)?;
    let thread_ref = cursor.save(&thread)?;
    index.threads.push(thread_ref);

    let root = cursor.replace_current(index)?;
    debug!(
        board = %root.identity(),
        seq = root.seq(),
        thread = %thread_ref.short(),
        "thread injected"
    );
    Ok((thread_ref, root))
}

/// Appends `post` to the page of the thread it replies to.
///
/// # Errors
/// `NotFound` if the thread is not in the board's thread index.
pub(crate) fn inject_post(
    cursor: &mut Cursor<'_, BoardObject>,
    post: Post,
) -> Result<(Reference, RootSnapshot)> {
    let index = cursor.advance(|_: &BoardThreads| true)?;
    if !index.threads.contains(&post.thread) {
        return Err(PqbbsError::not_found(format!(
            "thread {} on board {}",
            post.thread.short(),
            cursor.root().identity()
        )));
    }

    let mut pages = cursor.advance(|_: &ThreadPagesContainer| true)?;
    let post_ref = cursor.save(&post)?;
    pages.page_mut(post.thread).posts.push(post_ref);

    let root = cursor.replace_current(pages)?;
    debug!(
        board = %root.identity(),
        seq = root.seq(),
        thread = %post.thread.short(),
        post = %post_ref.short(),
        "post injected"
    );
    Ok((post_ref, root))
}

pub(crate) fn get_board(cursor: &Cursor<'_, BoardObject>) -> Result<Board> {
    Ok(cursor.advance(|_: &Board| true)?.into_inner())
}

/// Threads in injection order, with their references.
pub(crate) fn get_threads(cursor: &Cursor<'_, BoardObject>) -> Result<Vec<(Reference, Thread)>> {
    let index = cursor.advance(|_: &BoardThreads| true)?;
    index
        .threads
        .iter()
        .map(|reference| {
            cursor
                .deserialize(reference)
                .map(|thread| (*reference, thread))
                .map_err(|e| PqbbsError::corrupt(format!("thread {}", reference.short()), e))
        })
        .collect()
}

/// Posts of one thread in injection order, with their references.
pub(crate) fn get_posts(
    cursor: &Cursor<'_, BoardObject>,
    thread: &Reference,
) -> Result<Vec<(Reference, Post)>> {
    let pages = cursor.advance(|_: &ThreadPagesContainer| true)?;
    pages
        .posts_of(thread)
        .iter()
        .map(|reference| {
            cursor
                .deserialize(reference)
                .map(|post| (*reference, post))
                .map_err(|e| PqbbsError::corrupt(format!("post {}", reference.short()), e))
        })
        .collect()
}
