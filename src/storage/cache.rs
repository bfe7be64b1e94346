//! Two-tier record cache
//!
//! The static tier is a process-local LRU of hydrated records. The persistent
//! tier is a [`CacheBackend`] holding bincode-encoded records. Both are keyed
//! by `values:{entity_type}:{id}:{graph_id}`; persistent entries are tagged
//! `{entity_type}_values`.

use super::persistent::{
    CacheBackend, CacheError, CacheResult, MemoryCacheBackend, RocksDbCacheBackend,
};
use crate::config::CacheConfig;
use crate::entity::Record;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct TwoTierCache {
    memory: Option<Mutex<LruCache<String, Record>>>,
    persistent: Option<Arc<dyn CacheBackend>>,
}

impl TwoTierCache {
    /// `capacity` of zero disables the static tier
    pub fn new(capacity: usize, persistent: Option<Arc<dyn CacheBackend>>) -> Self {
        Self {
            memory: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
            persistent,
        }
    }

    /// No caching at all
    pub fn disabled() -> Self {
        Self::new(0, None)
    }

    /// Persistent tier on RocksDB when a path is set, in memory otherwise
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let capacity = if config.static_enabled { config.static_capacity } else { 0 };
        let persistent: Option<Arc<dyn CacheBackend>> = match (&config.persistent_path, config.persistent_enabled) {
            (_, false) => None,
            (Some(path), true) => Some(Arc::new(RocksDbCacheBackend::open(path)?)),
            (None, true) => Some(Arc::new(MemoryCacheBackend::new())),
        };
        Ok(Self::new(capacity, persistent))
    }

    pub fn cache_id(entity_type: &str, id: &str, graph_id: &str) -> String {
        format!("values:{}:{}:{}", entity_type, id, graph_id)
    }

    pub fn tag(entity_type: &str) -> String {
        format!("{}_values", entity_type)
    }

    /// Static tier first, then persistent; a persistent hit is promoted
    pub fn get(&self, entity_type: &str, id: &str, graph_id: &str) -> CacheResult<Option<Record>> {
        let cid = Self::cache_id(entity_type, id, graph_id);

        if let Some(memory) = &self.memory {
            let mut memory = memory.lock().map_err(|_| CacheError::LockPoisoned)?;
            if let Some(record) = memory.get(&cid) {
                debug!("Static cache hit: {}", cid);
                return Ok(Some(record.clone()));
            }
        }

        if let Some(persistent) = &self.persistent {
            if let Some(data) = persistent.get(&cid)? {
                let record: Record = bincode::deserialize(&data)?;
                debug!("Persistent cache hit: {}", cid);
                self.set_static(&cid, &record)?;
                return Ok(Some(record));
            }
        }

        debug!("Cache miss: {}", cid);
        Ok(None)
    }

    /// Store in both tiers under the record's active graph
    pub fn set(&self, record: &Record) -> CacheResult<()> {
        let (Some(id), Some(graph_id)) = (record.id(), record.graph()) else {
            return Ok(());
        };
        let cid = Self::cache_id(record.entity_type(), id, graph_id);
        self.set_static(&cid, record)?;
        if let Some(persistent) = &self.persistent {
            let data = bincode::serialize(record)?;
            persistent.set(&cid, data, &[Self::tag(record.entity_type())])?;
        }
        Ok(())
    }

    fn set_static(&self, cid: &str, record: &Record) -> CacheResult<()> {
        if let Some(memory) = &self.memory {
            let mut memory = memory.lock().map_err(|_| CacheError::LockPoisoned)?;
            memory.put(cid.to_string(), record.clone());
        }
        Ok(())
    }

    /// Evict (id, graph) pairs from both tiers
    pub fn invalidate<S: AsRef<str>, G: AsRef<str>>(
        &self,
        entity_type: &str,
        ids: &[S],
        graph_ids: &[G],
    ) -> CacheResult<()> {
        let cids: Vec<String> = ids
            .iter()
            .flat_map(|id| {
                graph_ids
                    .iter()
                    .map(move |g| Self::cache_id(entity_type, id.as_ref(), g.as_ref()))
            })
            .collect();

        if let Some(memory) = &self.memory {
            let mut memory = memory.lock().map_err(|_| CacheError::LockPoisoned)?;
            for cid in &cids {
                memory.pop(cid);
            }
        }
        if let Some(persistent) = &self.persistent {
            persistent.delete_multiple(&cids)?;
        }
        Ok(())
    }

    /// Drop everything cached for an entity type
    pub fn invalidate_type(&self, entity_type: &str) -> CacheResult<()> {
        if let Some(memory) = &self.memory {
            let prefix = format!("values:{}:", entity_type);
            let mut memory = memory.lock().map_err(|_| CacheError::LockPoisoned)?;
            let stale: Vec<String> = memory
                .iter()
                .filter(|(cid, _)| cid.starts_with(&prefix))
                .map(|(cid, _)| cid.clone())
                .collect();
            for cid in stale {
                memory.pop(&cid);
            }
        }
        if let Some(persistent) = &self.persistent {
            persistent.invalidate_tags(&[Self::tag(entity_type)])?;
        }
        Ok(())
    }

    /// Clear the static tier only
    pub fn reset_static(&self) -> CacheResult<()> {
        if let Some(memory) = &self.memory {
            memory.lock().map_err(|_| CacheError::LockPoisoned)?.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::persistent::MemoryCacheBackend;

    fn record(id: &str, graph: &str) -> Record {
        let mut record = Record::new("rdf_entity", "fruit").with_id(id).with_graph(graph);
        record.set_value("label", "Apple");
        record
    }

    #[test]
    fn test_cache_id_format() {
        assert_eq!(
            TwoTierCache::cache_id("rdf_entity", "http://ex/a", "draft"),
            "values:rdf_entity:http://ex/a:draft"
        );
        assert_eq!(TwoTierCache::tag("rdf_entity"), "rdf_entity_values");
    }

    #[test]
    fn test_persistent_hit_after_static_reset() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let cache = TwoTierCache::new(16, Some(backend.clone()));
        cache.set(&record("http://ex/a", "draft")).unwrap();
        assert_eq!(backend.len(), 1);

        cache.reset_static().unwrap();
        let hit = cache.get("rdf_entity", "http://ex/a", "draft").unwrap().unwrap();
        assert_eq!(hit.value("label").and_then(|v| v.as_string()), Some("Apple"));
        assert!(cache.get("rdf_entity", "http://ex/a", "default").unwrap().is_none());
    }

    #[test]
    fn test_invalidate_pairs_and_type() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let cache = TwoTierCache::new(16, Some(backend.clone()));
        cache.set(&record("http://ex/a", "draft")).unwrap();
        cache.set(&record("http://ex/a", "default")).unwrap();
        cache.set(&record("http://ex/b", "default")).unwrap();

        cache.invalidate("rdf_entity", &["http://ex/a"], &["draft"]).unwrap();
        assert!(cache.get("rdf_entity", "http://ex/a", "draft").unwrap().is_none());
        assert!(cache.get("rdf_entity", "http://ex/a", "default").unwrap().is_some());

        cache.invalidate_type("rdf_entity").unwrap();
        assert!(cache.get("rdf_entity", "http://ex/b", "default").unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_from_config_with_rocksdb() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = CacheConfig {
            static_enabled: false,
            persistent_path: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let cache = TwoTierCache::from_config(&config).unwrap();
        cache.set(&record("http://ex/a", "draft")).unwrap();
        assert!(cache.get("rdf_entity", "http://ex/a", "draft").unwrap().is_some());
    }

    #[test]
    fn test_disabled_cache() {
        let cache = TwoTierCache::disabled();
        cache.set(&record("http://ex/a", "draft")).unwrap();
        assert!(cache.get("rdf_entity", "http://ex/a", "draft").unwrap().is_none());
    }
}
