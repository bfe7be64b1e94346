//! Removing records from the store

use super::{EntityStorage, StorageError, StorageResult};
use crate::entity::Record;
use crate::query::update;
use indexmap::IndexMap;
use tracing::debug;

impl EntityStorage {
    /// Delete records from every graph their bundle is configured for
    pub fn delete(&self, records: &[Record]) -> StorageResult<()> {
        let uris = self.resolver.graph_uris(&self.entity_type)?;
        let mut by_graph: IndexMap<&str, Vec<&str>> = IndexMap::new();
        let mut ids: Vec<&str> = Vec::new();

        for record in records {
            self.check_record(record)?;
            let Some(id) = record.id() else {
                continue;
            };
            ids.push(id);
            for graph_uri in uris.get(record.bundle()).into_iter().flat_map(|g| g.values()) {
                by_graph.entry(graph_uri.as_str()).or_default().push(id);
            }
        }

        self.delete_grouped(&by_graph)?;
        let graph_ids = self.resolver.entity_type_graph_ids(&self.entity_type)?;
        self.cache.invalidate(&self.entity_type, &ids, &graph_ids)?;
        Ok(())
    }

    /// Delete records from one graph only; copies in other graphs stay
    ///
    /// Each record is reloaded from that graph first so subjects absent from
    /// it are left alone.
    pub fn delete_from_graph(&self, records: &[Record], graph_id: &str) -> StorageResult<()> {
        let graph_ids = [graph_id.to_string()];
        self.validate_graph_ids(&graph_ids)?;

        let mut ids: Vec<&str> = Vec::new();
        for record in records {
            self.check_record(record)?;
            if let Some(id) = record.id() {
                ids.push(id);
            }
        }
        self.cache.invalidate(&self.entity_type, &ids, &graph_ids)?;
        let present = self.load_multiple(&ids, Some(&graph_ids))?;

        let mut by_graph: IndexMap<String, Vec<&str>> = IndexMap::new();
        for record in &present.records {
            let graph_uri = self
                .resolver
                .bundle_graph_uri(&self.entity_type, record.bundle(), graph_id)?;
            if let Some(id) = ids.iter().copied().find(|id| record.id() == Some(*id)) {
                by_graph.entry(graph_uri).or_default().push(id);
            }
        }
        self.delete_grouped(&by_graph)?;

        let all_graphs = self.resolver.entity_type_graph_ids(&self.entity_type)?;
        self.cache.invalidate(&self.entity_type, &ids, &all_graphs)?;
        Ok(())
    }

    /// Drop cached copies
    ///
    /// Without ids the whole entity type is evicted. Graph ids narrow an
    /// id-based reset and are meaningless on their own.
    pub fn reset_cache(&self, ids: Option<&[String]>, graph_ids: Option<&[String]>) -> StorageResult<()> {
        match (ids, graph_ids) {
            (None, Some(_)) => Err(StorageError::GraphsWithoutIds),
            (None, None) => Ok(self.cache.invalidate_type(&self.entity_type)?),
            (Some(ids), Some(graph_ids)) => Ok(self.cache.invalidate(&self.entity_type, ids, graph_ids)?),
            (Some(ids), None) => {
                let graph_ids = self.resolver.entity_type_graph_ids(&self.entity_type)?;
                Ok(self.cache.invalidate(&self.entity_type, ids, &graph_ids)?)
            }
        }
    }

    /// One DELETE per graph URI and batch of ids
    fn delete_grouped<K: AsRef<str>>(&self, by_graph: &IndexMap<K, Vec<&str>>) -> StorageResult<()> {
        let dialect = self.connection.dialect();
        for (graph_uri, ids) in by_graph {
            let graph_uri = graph_uri.as_ref();
            for chunk in ids.chunks(self.config.batch_size) {
                debug!("Deleting {} subjects from <{}>", chunk.len(), graph_uri);
                let query = update::delete_subjects(dialect, graph_uri, chunk)?;
                self.connection.update(&query)?;
            }
        }
        Ok(())
    }
}
