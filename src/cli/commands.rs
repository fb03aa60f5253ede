//! Command implementations for the PQBBS CLI.
//!
//! Each command returns a JSON value that the caller prints.

use crate::board::{Board, BoardConfig, BoardCore, Post, Thread, Transport, Vote};
use crate::cli::args::{Command, VoteScope};
use crate::crypto::KeyPair;
use crate::graph::{Identity, Reference};
use crate::Result;
use serde_json::{json, Value};
use tracing::info;

fn vote_json(vote: &Vote) -> Value {
    json!({
        "voter": vote.voter.to_hex(),
        "value": vote.value,
        "tag": vote.tag,
        "created_at": vote.created_at,
    })
}

/// Execute one command against an open node.
pub fn execute<T: Transport + 'static>(core: &BoardCore<T>, command: Command) -> Result<Value> {
    match command {
        Command::NewBoard { name, url } => new_board(core, &name, &url),
        Command::Boards => Ok(boards(core)),
        Command::Subscribe { board } => {
            let config = core.subscribe_to_board(&board)?;
            Ok(json!({ "board": board.to_hex(), "master": config.is_master() }))
        }
        Command::Unsubscribe { board } => {
            core.unsubscribe_from_board(&board)?;
            Ok(json!({ "board": board.to_hex(), "unsubscribed": true }))
        }
        Command::NewThread { board, title, body } => {
            let thread = core.inject_thread(&board, Thread::new(title, body, board)?)?;
            Ok(json!({ "board": board.to_hex(), "thread": thread.to_hex() }))
        }
        Command::Threads { board } => threads(core, &board),
        Command::NewPost {
            board,
            thread,
            body,
        } => {
            let post = core.inject_post(&board, Post::new(thread, body, board)?)?;
            Ok(json!({ "board": board.to_hex(), "thread": thread.to_hex(), "post": post.to_hex() }))
        }
        Command::Posts { board, thread } => posts(core, &board, &thread),
        Command::Vote {
            scope,
            board,
            target,
            voter,
            value,
        } => {
            let vote = Vote::new(voter, value);
            match scope {
                VoteScope::Thread => core.add_vote_for_thread(&board, target, vote)?,
                VoteScope::Post => core.add_vote_for_post(&board, target, vote)?,
            }
            votes(core, scope, &board, &target)
        }
        Command::Unvote {
            scope,
            board,
            target,
            voter,
        } => {
            let removed = match scope {
                VoteScope::Thread => core.remove_vote_for_thread(&voter, &board, &target)?,
                VoteScope::Post => core.remove_vote_for_post(&voter, &board, &target)?,
            };
            let mut listing = votes(core, scope, &board, &target)?;
            listing["removed"] = json!(removed);
            Ok(listing)
        }
        Command::Votes {
            scope,
            board,
            target,
        } => votes(core, scope, &board, &target),
    }
}

fn new_board<T: Transport + 'static>(core: &BoardCore<T>, name: &str, url: &str) -> Result<Value> {
    let board = Board::new(name, url)?;
    let keypair = KeyPair::generate_mldsa87()?;
    let identity = core.inject_board(BoardConfig::master(keypair), board)?;
    info!(board = %identity, name = name, "created board");
    Ok(json!({ "board": identity.to_hex(), "name": name, "url": url }))
}

fn boards<T: Transport + 'static>(core: &BoardCore<T>) -> Value {
    let list: Vec<Value> = core
        .list_boards()
        .iter()
        .map(|config| {
            let identity = config.identity();
            let name = core.get_board(identity).ok().map(|b| b.name);
            let seq = core.latest_root(identity).map(|r| r.seq());
            json!({
                "board": identity.to_hex(),
                "master": config.is_master(),
                "name": name,
                "seq": seq,
            })
        })
        .collect();
    Value::Array(list)
}

fn threads<T: Transport + 'static>(core: &BoardCore<T>, board: &Identity) -> Result<Value> {
    let list: Vec<Value> = core
        .get_threads(board)?
        .into_iter()
        .map(|(reference, thread)| {
            json!({
                "thread": reference.to_hex(),
                "title": thread.title,
                "body": thread.body,
                "author": thread.author.to_hex(),
                "created_at": thread.created_at,
            })
        })
        .collect();
    Ok(Value::Array(list))
}

fn posts<T: Transport + 'static>(
    core: &BoardCore<T>,
    board: &Identity,
    thread: &Reference,
) -> Result<Value> {
    let list: Vec<Value> = core
        .get_posts(board, thread)?
        .into_iter()
        .map(|(reference, post)| {
            json!({
                "post": reference.to_hex(),
                "body": post.body,
                "author": post.author.to_hex(),
                "created_at": post.created_at,
            })
        })
        .collect();
    Ok(Value::Array(list))
}

fn votes<T: Transport + 'static>(
    core: &BoardCore<T>,
    scope: VoteScope,
    board: &Identity,
    target: &Reference,
) -> Result<Value> {
    let list = match scope {
        VoteScope::Thread => core.get_votes_for_thread(board, target)?,
        VoteScope::Post => core.get_votes_for_post(board, target)?,
    };
    let total: i64 = list.iter().map(|v| i64::from(v.value)).sum();
    Ok(json!({
        "target": target.to_hex(),
        "total": total,
        "votes": list.iter().map(vote_json).collect::<Vec<_>>(),
    }))
}
