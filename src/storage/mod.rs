//! Persistent storage backend.
//!
//! - `rocksdb`: RocksDB configuration and a thin typed handle

pub mod rocksdb;

pub use rocksdb::{RocksDbConfig, RocksDbHandle};
