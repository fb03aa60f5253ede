//! Command-line interface for PQBBS.
//!
//! A single invocation opens the node database, runs one command against a
//! local transport and prints the result as JSON.

pub mod args;
pub mod commands;
pub mod utils;

use crate::board::{BoardCore, LocalTransport};
use crate::Result;
use std::sync::Arc;

pub use args::{Command, Invocation, VoteScope};

/// Main entry point for the CLI application
pub fn run(invocation: Invocation) -> Result<()> {
    let config = utils::resolve_config(invocation.data_dir)?;
    let core = BoardCore::open(&config, Arc::new(LocalTransport::new()))?;

    let output = commands::execute(&core, invocation.command)?;
    let rendered = serde_json::to_string_pretty(&output).map_err(|e| {
        crate::error::PqbbsError::serialization(format!("Failed to render output: {}", e))
    })?;
    println!("{}", rendered);
    Ok(())
}
