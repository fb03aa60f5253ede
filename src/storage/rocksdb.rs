//! RocksDB handle shared by the object store and the board registry.
//!
//! Nothing in here knows about boards or graph objects. Callers pick a column
//! family and a key; values are either raw bytes or bincode-encoded.

use crate::error::{PqbbsError, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::fmt::Display;
use tracing::{debug, trace};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for the node database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of info log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum total WAL size in bytes.
    pub max_wal_size: u64,
    /// Memtable size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of memtables.
    pub max_write_buffer_number: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            keep_log_file_num: 2,
            max_wal_size: 16 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            max_write_buffer_number: 2,
        }
    }
}

impl RocksDbConfig {
    /// Larger buffers for a long-running node that hosts many boards.
    pub fn for_server() -> Self {
        Self {
            max_open_files: 512,
            keep_log_file_num: 3,
            max_wal_size: 64 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
        }
    }

    fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

// =============================================================================
// Handle
// =============================================================================

/// A cloneable, thread-safe RocksDB handle.
#[derive(Clone)]
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbHandle {
    /// Opens (or creates) a database with the given column families.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let opts = config.build_options();
        let cf_descriptors: Vec<_> = column_families
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, Options::default()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            cf_descriptors,
        )
        .map_err(|e| PqbbsError::storage(format!("Failed to open RocksDB: {}", e)))?;

        debug!(path = ?db_path.as_ref(), cfs = column_families.len(), "db_open");
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PqbbsError::storage(format!("Column family '{}' not found", name)))
    }

    /// Stores a bincode-encoded value.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)
            .map_err(|e| PqbbsError::serialization(format!("Failed to serialize: {}", e)))?;
        self.put_raw(cf_name, key, &bytes)
    }

    /// Stores raw bytes.
    pub fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        trace!(
            cf = cf_name,
            key_len = key.len(),
            value_bytes = value.len(),
            "db_put"
        );
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| PqbbsError::storage(format!("Failed to write: {}", e)))
    }

    /// Loads raw bytes.
    pub fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let value = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| PqbbsError::storage(format!("Failed to read: {}", e)))?;
        trace!(
            cf = cf_name,
            key_len = key.len(),
            found = value.is_some(),
            "db_get"
        );
        Ok(value)
    }

    /// Checks whether a key is present.
    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_pinned_cf(&cf, key)
            .map(|v| v.is_some())
            .map_err(|e| PqbbsError::storage(format!("Failed to check key: {}", e)))
    }

    /// Deletes a key. Deleting an absent key is not an error.
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        trace!(cf = cf_name, key_len = key.len(), "db_delete");
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| PqbbsError::storage(format!("Failed to delete: {}", e)))
    }

    /// Visits every entry of a column family until the callback returns false.
    ///
    /// # Errors
    /// `Storage` if the iterator fails part way; entries already visited
    /// must then be discarded by the caller.
    pub fn iterate_all<F>(&self, cf_name: &str, callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let items = self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start);
        let count = visit_entries(cf_name, items, callback)?;
        debug!(cf = cf_name, records_iterated = count, "db_iterate_all");
        Ok(())
    }
}

fn visit_entries<I, K, V, E, F>(cf_name: &str, items: I, mut callback: F) -> Result<usize>
where
    I: IntoIterator<Item = std::result::Result<(K, V), E>>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
    E: Display,
    F: FnMut(&[u8], &[u8]) -> bool,
{
    let mut count = 0;
    for item in items {
        let (key, value) = item.map_err(|e| {
            PqbbsError::storage(format!(
                "Iterator failed in '{}' after {} records: {}",
                cf_name, count, e
            ))
        })?;
        count += 1;
        if !callback(key.as_ref(), value.as_ref()) {
            break;
        }
    }
    Ok(count)
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Entry {
        name: String,
        seq: u64,
    }

    fn create_test_db() -> (RocksDbHandle, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = RocksDbHandle::open(
            temp_dir.path().join("db"),
            &RocksDbConfig::default(),
            &["objects", "roots"],
        )
        .expect("Failed to open db");
        (db, temp_dir)
    }

    #[test]
    fn test_put_and_get_raw() {
        let (db, _temp) = create_test_db();
        let entry = Entry {
            name: "general".to_string(),
            seq: 3,
        };

        db.put("roots", b"board", &entry).unwrap();
        let bytes = db.get_raw("roots", b"board").unwrap().unwrap();
        let loaded: Entry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(loaded, entry);
    }

    #[test]
    fn test_get_missing_key() {
        let (db, _temp) = create_test_db();
        assert!(db.get_raw("roots", b"nope").unwrap().is_none());
    }

    #[test]
    fn test_iterate_in_key_order() {
        let (db, _temp) = create_test_db();
        db.put_raw("objects", b"b", b"2").unwrap();
        db.put_raw("objects", b"a", b"1").unwrap();

        let mut seen = Vec::new();
        db.iterate_all("objects", |key, _| {
            seen.push(key.to_vec());
            true
        })
        .unwrap();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_iterator_error_is_reported() {
        let items: Vec<std::result::Result<(Vec<u8>, Vec<u8>), String>> = vec![
            Ok((b"a".to_vec(), b"1".to_vec())),
            Err("corruption in block".to_string()),
            Ok((b"c".to_vec(), b"3".to_vec())),
        ];

        let mut seen = 0;
        let result = visit_entries("boards", items, |_, _| {
            seen += 1;
            true
        });
        assert!(matches!(result, Err(PqbbsError::Storage(ref m)) if m.contains("corruption")));
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_visit_stops_when_callback_declines() {
        let items: Vec<std::result::Result<(Vec<u8>, Vec<u8>), String>> = vec![
            Ok((b"a".to_vec(), b"1".to_vec())),
            Ok((b"b".to_vec(), b"2".to_vec())),
        ];
        assert_eq!(visit_entries("objects", items, |_, _| false).unwrap(), 1);
    }

    #[test]
    fn test_exists_and_delete() {
        let (db, _temp) = create_test_db();
        db.put_raw("objects", b"key", b"value").unwrap();
        assert!(db.exists("objects", b"key").unwrap());

        db.delete("objects", b"key").unwrap();
        assert!(!db.exists("objects", b"key").unwrap());
        db.delete("objects", b"key").unwrap();
    }

    #[test]
    fn test_unknown_column_family() {
        let (db, _temp) = create_test_db();
        assert!(matches!(
            db.put_raw("missing", b"k", b"v"),
            Err(PqbbsError::Storage(_))
        ));
    }

    #[test]
    fn test_server_config() {
        let config = RocksDbConfig::for_server();
        assert_eq!(config.max_open_files, 512);
        assert!(config.write_buffer_size > RocksDbConfig::default().write_buffer_size);
    }
}
