//! Command-line argument parsing for PQBBS.

use crate::error::{PqbbsError, Result};
use crate::graph::{Identity, Reference};
use std::env;
use std::path::PathBuf;
use std::process;

/// Which vote container a vote command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteScope {
    Thread,
    Post,
}

/// Command-line interface commands
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    NewBoard {
        name: String,
        url: String,
    },
    Boards,
    Subscribe {
        board: Identity,
    },
    Unsubscribe {
        board: Identity,
    },
    NewThread {
        board: Identity,
        title: String,
        body: String,
    },
    Threads {
        board: Identity,
    },
    NewPost {
        board: Identity,
        thread: Reference,
        body: String,
    },
    Posts {
        board: Identity,
        thread: Reference,
    },
    Vote {
        scope: VoteScope,
        board: Identity,
        target: Reference,
        voter: Identity,
        value: i8,
    },
    Unvote {
        scope: VoteScope,
        board: Identity,
        target: Reference,
        voter: Identity,
    },
    Votes {
        scope: VoteScope,
        board: Identity,
        target: Reference,
    },
}

/// A parsed command line.
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation {
    /// `--data-dir`, overriding `PQBBS_DATA`.
    pub data_dir: Option<PathBuf>,
    pub command: Command,
}

/// Parse the process arguments, printing usage and exiting on error.
pub fn parse_args() -> Invocation {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        process::exit(1);
    }
    match parse_from(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'pqbbs help' for usage.");
            process::exit(1);
        }
    }
}

/// Parse arguments (without the program name).
pub fn parse_from(args: &[String]) -> Result<Invocation> {
    let mut data_dir = None;
    let mut rest = args;
    while let Some(first) = rest.first() {
        if first != "--data-dir" {
            break;
        }
        let dir = rest
            .get(1)
            .ok_or_else(|| PqbbsError::validation("--data-dir requires a directory"))?;
        data_dir = Some(PathBuf::from(dir));
        rest = &rest[2..];
    }

    let (name, params) = rest
        .split_first()
        .ok_or_else(|| PqbbsError::validation("missing command"))?;

    let need = |count: usize, usage: &str| -> Result<()> {
        if params.len() < count {
            return Err(PqbbsError::validation(format!("usage: pqbbs {}", usage)));
        }
        Ok(())
    };

    let command = match name.as_str() {
        "new-board" => {
            need(2, "new-board <name> <url>")?;
            Command::NewBoard {
                name: params[0].clone(),
                url: params[1].clone(),
            }
        }
        "boards" => Command::Boards,
        "subscribe" => {
            need(1, "subscribe <board>")?;
            Command::Subscribe {
                board: Identity::from_hex(&params[0])?,
            }
        }
        "unsubscribe" => {
            need(1, "unsubscribe <board>")?;
            Command::Unsubscribe {
                board: Identity::from_hex(&params[0])?,
            }
        }
        "new-thread" => {
            need(3, "new-thread <board> <title> <body>")?;
            Command::NewThread {
                board: Identity::from_hex(&params[0])?,
                title: params[1].clone(),
                body: params[2].clone(),
            }
        }
        "threads" => {
            need(1, "threads <board>")?;
            Command::Threads {
                board: Identity::from_hex(&params[0])?,
            }
        }
        "new-post" => {
            need(3, "new-post <board> <thread> <body>")?;
            Command::NewPost {
                board: Identity::from_hex(&params[0])?,
                thread: Reference::from_hex(&params[1])?,
                body: params[2].clone(),
            }
        }
        "posts" => {
            need(2, "posts <board> <thread>")?;
            Command::Posts {
                board: Identity::from_hex(&params[0])?,
                thread: Reference::from_hex(&params[1])?,
            }
        }
        "vote-thread" | "vote-post" => {
            need(4, &format!("{} <board> <target> <voter> <value>", name))?;
            let value = params[3].parse::<i8>().map_err(|_| {
                PqbbsError::validation(format!("vote value '{}' is not a small integer", params[3]))
            })?;
            Command::Vote {
                scope: scope_of(name),
                board: Identity::from_hex(&params[0])?,
                target: Reference::from_hex(&params[1])?,
                voter: Identity::from_hex(&params[2])?,
                value,
            }
        }
        "unvote-thread" | "unvote-post" => {
            need(3, &format!("{} <board> <target> <voter>", name))?;
            Command::Unvote {
                scope: scope_of(name),
                board: Identity::from_hex(&params[0])?,
                target: Reference::from_hex(&params[1])?,
                voter: Identity::from_hex(&params[2])?,
            }
        }
        "votes-thread" | "votes-post" => {
            need(2, &format!("{} <board> <target>", name))?;
            Command::Votes {
                scope: scope_of(name),
                board: Identity::from_hex(&params[0])?,
                target: Reference::from_hex(&params[1])?,
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            process::exit(0);
        }
        other => {
            return Err(PqbbsError::validation(format!(
                "unknown command '{}'",
                other
            )))
        }
    };

    Ok(Invocation { data_dir, command })
}

fn scope_of(name: &str) -> VoteScope {
    if name.ends_with("-post") {
        VoteScope::Post
    } else {
        VoteScope::Thread
    }
}

/// Print usage information
pub fn print_usage() {
    println!("PQBBS - Post-Quantum Bulletin Board System");
    println!("==========================================");
    println!();
    println!("Usage: pqbbs [--data-dir DIR] <command> [args...]");
    println!();
    println!("Commands:");
    println!("  new-board <name> <url>                        Create a board you own");
    println!("  boards                                        List known boards");
    println!("  subscribe <board>                             Follow a board");
    println!("  unsubscribe <board>                           Stop following a board");
    println!("  new-thread <board> <title> <body>             Start a thread");
    println!("  threads <board>                               List threads");
    println!("  new-post <board> <thread> <body>              Reply to a thread");
    println!("  posts <board> <thread>                        List posts of a thread");
    println!("  vote-thread|vote-post <board> <target> <voter> <value>");
    println!("                                                Vote (one vote per voter)");
    println!("  unvote-thread|unvote-post <board> <target> <voter>");
    println!("                                                Withdraw a vote");
    println!("  votes-thread|votes-post <board> <target>      List votes");
    println!();
    println!("Boards, voters and targets are given as hex identities and references.");
    println!("Output is JSON. The data directory defaults to $PQBBS_DATA, then ~/.pqbbs.");
}
