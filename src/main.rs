//! PQBBS Command Line Interface
//!
//! A post-quantum signed bulletin board node in Rust.

use pqbbs::cli;
use pqbbs::config::DEFAULT_LOG_FILTER;
use tracing_subscriber::EnvFilter;

fn main() {
    let invocation = cli::args::parse_args();

    // RUST_LOG wins over PQBBS_LOG
    let fallback = std::env::var("PQBBS_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(invocation) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
