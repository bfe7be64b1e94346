//! Persistent cache backends
//!
//! Entries are opaque byte blobs keyed by cache id and labelled with tags.
//! Invalidating a tag drops every entry carrying it.

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Entry could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Column family missing
    #[error("Column family error: {0}")]
    ColumnFamily(String),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Storage for the persistent cache tier
pub trait CacheBackend: Send + Sync {
    fn get(&self, cid: &str) -> CacheResult<Option<Vec<u8>>>;

    fn set(&self, cid: &str, data: Vec<u8>, tags: &[String]) -> CacheResult<()>;

    fn delete_multiple(&self, cids: &[String]) -> CacheResult<()>;

    fn invalidate_tags(&self, tags: &[String]) -> CacheResult<()>;
}

/// In-process backend, for tests and single-process setups
#[derive(Default)]
pub struct MemoryCacheBackend {
    entries: RwLock<HashMap<String, (Vec<u8>, Vec<String>)>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn get(&self, cid: &str) -> CacheResult<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(entries.get(cid).map(|(data, _)| data.clone()))
    }

    fn set(&self, cid: &str, data: Vec<u8>, tags: &[String]) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        entries.insert(cid.to_string(), (data, tags.to_vec()));
        Ok(())
    }

    fn delete_multiple(&self, cids: &[String]) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        for cid in cids {
            entries.remove(cid);
        }
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[String]) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        entries.retain(|_, (_, entry_tags)| !entry_tags.iter().any(|t| tags.contains(t)));
        Ok(())
    }
}

const ENTRIES_CF: &str = "entries";
const TAGS_CF: &str = "tags";
const ENTRY_TAGS_CF: &str = "entry_tags";

/// RocksDB backend; survives restarts
///
/// `entries` maps cache id → blob. `tags` holds one empty-valued key per
/// (tag, cache id) pair, `{tag}\0{cid}`, so a tag is invalidated with a prefix scan.
/// `entry_tags` maps cache id → its bincode-encoded tag list, so removing an
/// entry also removes its keys from `tags`.
pub struct RocksDbCacheBackend {
    db: Arc<DB>,
}

impl RocksDbCacheBackend {
    /// Open or create the cache database
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        info!("Opening persistent cache at: {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(ENTRIES_CF, Self::entries_cf_options()),
            ColumnFamilyDescriptor::new(TAGS_CF, Options::default()),
            ColumnFamilyDescriptor::new(ENTRY_TAGS_CF, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        info!("Persistent cache opened successfully");

        Ok(Self { db: Arc::new(db) })
    }

    fn entries_cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn tag_key(tag: &str, cid: &str) -> Vec<u8> {
        format!("{}\0{}", tag, cid).into_bytes()
    }

    fn cf(&self, name: &str) -> CacheResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CacheError::ColumnFamily(name.to_string()))
    }

    /// Queue removal of an entry together with every tag key pointing at it
    fn remove_entry(&self, batch: &mut WriteBatch, cid: &str) -> CacheResult<()> {
        let entries = self.cf(ENTRIES_CF)?;
        let tag_cf = self.cf(TAGS_CF)?;
        let entry_tags = self.cf(ENTRY_TAGS_CF)?;

        if let Some(encoded) = self.db.get_cf(&entry_tags, cid.as_bytes())? {
            let tags: Vec<String> = bincode::deserialize(&encoded)?;
            for tag in &tags {
                batch.delete_cf(&tag_cf, Self::tag_key(tag, cid));
            }
        }
        batch.delete_cf(&entries, cid.as_bytes());
        batch.delete_cf(&entry_tags, cid.as_bytes());
        Ok(())
    }

    /// Number of (tag, cache id) index keys
    pub fn tag_index_len(&self) -> CacheResult<usize> {
        let tag_cf = self.cf(TAGS_CF)?;
        let mut count = 0;
        for item in self.db.iterator_cf(&tag_cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> CacheResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl CacheBackend for RocksDbCacheBackend {
    fn get(&self, cid: &str) -> CacheResult<Option<Vec<u8>>> {
        let cf = self.cf(ENTRIES_CF)?;
        Ok(self.db.get_cf(&cf, cid.as_bytes())?)
    }

    fn set(&self, cid: &str, data: Vec<u8>, tags: &[String]) -> CacheResult<()> {
        let entries = self.cf(ENTRIES_CF)?;
        let tag_cf = self.cf(TAGS_CF)?;
        let entry_tags = self.cf(ENTRY_TAGS_CF)?;

        // an overwritten entry may have carried other tags
        let mut batch = WriteBatch::default();
        self.remove_entry(&mut batch, cid)?;
        batch.put_cf(&entries, cid.as_bytes(), data);
        batch.put_cf(&entry_tags, cid.as_bytes(), bincode::serialize(tags)?);
        for tag in tags {
            batch.put_cf(&tag_cf, Self::tag_key(tag, cid), b"");
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn delete_multiple(&self, cids: &[String]) -> CacheResult<()> {
        let mut batch = WriteBatch::default();
        for cid in cids {
            self.remove_entry(&mut batch, cid)?;
        }
        self.db.write(batch)?;
        debug!("Deleted {} persistent cache entries", cids.len());
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[String]) -> CacheResult<()> {
        let tag_cf = self.cf(TAGS_CF)?;

        let mut batch = WriteBatch::default();
        let mut dropped = 0;
        for tag in tags {
            let prefix = format!("{}\0", tag);
            for item in self.db.prefix_iterator_cf(&tag_cf, prefix.as_bytes()) {
                let (key, _) = item?;
                // the iterator runs past the prefix without an extractor
                if !key.starts_with(prefix.as_bytes()) {
                    break;
                }
                let cid = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                self.remove_entry(&mut batch, &cid)?;
                batch.delete_cf(&tag_cf, &key);
                dropped += 1;
            }
        }
        self.db.write(batch)?;
        debug!("Invalidated tags {:?}: {} entries", tags, dropped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(backend: &dyn CacheBackend) {
        let fruit = vec!["fruit_values".to_string()];
        let veg = vec!["vegetable_values".to_string()];
        backend.set("values:fruit:a:default", vec![1], &fruit).unwrap();
        backend.set("values:fruit:b:default", vec![2], &fruit).unwrap();
        backend.set("values:vegetable:c:default", vec![3], &veg).unwrap();

        assert_eq!(backend.get("values:fruit:a:default").unwrap(), Some(vec![1]));

        backend.delete_multiple(&["values:fruit:a:default".to_string()]).unwrap();
        assert_eq!(backend.get("values:fruit:a:default").unwrap(), None);

        backend.invalidate_tags(&fruit).unwrap();
        assert_eq!(backend.get("values:fruit:b:default").unwrap(), None);
        assert_eq!(backend.get("values:vegetable:c:default").unwrap(), Some(vec![3]));
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryCacheBackend::new();
        exercise(&backend);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_rocksdb_backend() {
        let dir = TempDir::new().unwrap();
        let backend = RocksDbCacheBackend::open(dir.path()).unwrap();
        exercise(&backend);
    }

    #[test]
    fn test_rocksdb_delete_drops_tag_keys() {
        let dir = TempDir::new().unwrap();
        let backend = RocksDbCacheBackend::open(dir.path()).unwrap();
        let tags = vec!["fruit_values".to_string(), "rdf_entity_values".to_string()];
        backend.set("values:fruit:a:default", vec![1], &tags).unwrap();
        backend.set("values:fruit:b:default", vec![2], &tags[..1]).unwrap();
        assert_eq!(backend.tag_index_len().unwrap(), 3);

        backend.delete_multiple(&["values:fruit:a:default".to_string()]).unwrap();
        assert_eq!(backend.tag_index_len().unwrap(), 1);

        // retagging replaces the old index keys
        backend.set("values:fruit:b:default", vec![3], &tags[1..]).unwrap();
        assert_eq!(backend.tag_index_len().unwrap(), 1);
        backend.invalidate_tags(&tags[..1]).unwrap();
        assert_eq!(backend.get("values:fruit:b:default").unwrap(), Some(vec![3]));

        backend.invalidate_tags(&tags[1..]).unwrap();
        assert_eq!(backend.get("values:fruit:b:default").unwrap(), None);
        assert_eq!(backend.tag_index_len().unwrap(), 0);
    }

    #[test]
    fn test_rocksdb_backend_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let backend = RocksDbCacheBackend::open(dir.path()).unwrap();
            backend.set("values:fruit:a:default", vec![7], &[]).unwrap();
            backend.flush().unwrap();
        }
        let backend = RocksDbCacheBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("values:fruit:a:default").unwrap(), Some(vec![7]));
    }
}
