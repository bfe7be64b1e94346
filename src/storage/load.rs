//! Loading records across candidate graphs

use super::{EntityStorage, StorageError, StorageResult};
use crate::entity::{FieldItem, FieldValue, RawRecord, RawRepository, Record, LANGCODE_DEFAULT};
use crate::mapping::{BundleMatch, EntityTypeMapping};
use crate::query::{update, Operator};
use crate::rdf::TripleGraph;
use crate::sparql::ConnectionError;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of a multi-id load
///
/// Ids that resolve to no bundle, or to several, are reported per id and do
/// not stop the rest of the batch. Ids found in no candidate graph appear in
/// neither list.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Found records, in request order
    pub records: Vec<Record>,
    pub errors: IndexMap<String, StorageError>,
}

impl LoadOutcome {
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == Some(id))
    }
}

impl EntityStorage {
    /// Load one record from the first candidate graph that holds it
    ///
    /// Without candidates the entity type's default graphs apply.
    pub fn load(&self, id: &str, graph_ids: Option<&[String]>) -> StorageResult<Option<Record>> {
        let mut outcome = self.load_multiple(&[id], graph_ids)?;
        if let Some(err) = outcome.errors.shift_remove(id) {
            return Err(err);
        }
        Ok(outcome.records.pop())
    }

    /// Load several records, one bulk fetch per batch of cache misses
    pub fn load_multiple<S: AsRef<str>>(
        &self,
        ids: &[S],
        graph_ids: Option<&[String]>,
    ) -> StorageResult<LoadOutcome> {
        let candidates = self.candidate_graphs(graph_ids)?;
        let mut outcome = LoadOutcome::default();
        let Some(first) = candidates.first() else {
            return Ok(outcome);
        };

        let mut found: HashMap<String, Record> = HashMap::new();
        let mut misses: Vec<&str> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            // Only the first candidate is looked up
            match self.cache.get(&self.entity_type, id, first) {
                Ok(Some(record)) => {
                    found.insert(id.to_string(), record);
                }
                Ok(None) => misses.push(id),
                Err(e) => {
                    warn!("Cache lookup failed for {}: {}", id, e);
                    misses.push(id);
                }
            }
        }

        if !misses.is_empty() {
            let mapping = self.codec.registry().build(&self.entity_type)?;
            let all_uris = self.resolver.graph_uris_flat(&self.entity_type, None)?;
            let levels = candidates
                .iter()
                .map(|graph_id| {
                    self.resolver
                        .graph_uris_flat(&self.entity_type, Some(std::slice::from_ref(graph_id)))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for chunk in misses.chunks(self.config.batch_size) {
                debug!("Bulk fetch of {} '{}' ids", chunk.len(), self.entity_type);
                let query = update::bulk_fetch(chunk, &all_uris)?;
                let solutions = self
                    .connection
                    .query(&query)?
                    .into_solutions()
                    .ok_or(ConnectionError::UnexpectedResult { expected: "solutions" })?;
                let fetched = RawRepository::from_solutions(&solutions);
                let by_level: Vec<RawRepository> = levels
                    .iter()
                    .map(|uris| fetched.filter_by_graph_uris(uris))
                    .collect();

                // a copy in a graph its bundle doesn't own yields to the next candidate
                for id in chunk {
                    for raw in by_level.iter().filter_map(|level| level.get(id)) {
                        match self.hydrate(&mapping, raw) {
                            Ok(Some(record)) => {
                                if let Err(e) = self.cache.set(&record) {
                                    warn!("Cache write failed for {}: {}", id, e);
                                }
                                found.insert(id.to_string(), record);
                                break;
                            }
                            Ok(None) => continue,
                            Err(e @ (StorageError::AmbiguousBundle { .. } | StorageError::BundleNotFound { .. })) => {
                                warn!("Skipping {}: {}", id, e);
                                outcome.errors.insert(id.to_string(), e);
                                break;
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }

        for id in ids {
            if let Some(record) = found.remove(id.as_ref()) {
                outcome.records.push(record);
            }
        }
        Ok(outcome)
    }

    /// Load bypassing both cache tiers
    pub fn load_unchanged(&self, id: &str, graph_ids: Option<&[String]>) -> StorageResult<Option<Record>> {
        let candidates = self.candidate_graphs(graph_ids)?;
        self.cache.invalidate(&self.entity_type, &[id], &candidates)?;
        self.load(id, Some(&candidates))
    }

    /// Records whose fields equal all the given values
    pub fn load_by_properties(
        &self,
        values: &[(&str, FieldValue)],
        graph_ids: Option<&[String]>,
    ) -> StorageResult<Vec<Record>> {
        let candidates = self.candidate_graphs(graph_ids)?;
        let query = values.iter().fold(
            self.query().graphs(candidates.clone()),
            |query, (field, value)| query.condition(field, value.clone(), Operator::Eq),
        );
        let ids = query.execute()?;
        Ok(self.load_multiple(&ids, Some(&candidates))?.records)
    }

    /// Whether the record has triples in the given graph
    pub fn has_graph(&self, record: &Record, graph_id: &str) -> StorageResult<bool> {
        self.validate_graph_ids(&[graph_id.to_string()])?;
        let Some(id) = record.id() else {
            return Ok(false);
        };
        let Ok(graph_uri) = self
            .resolver
            .bundle_graph_uri(&self.entity_type, record.bundle(), graph_id)
        else {
            return Ok(false);
        };
        self.id_exists(id, Some(&graph_uri))
    }

    /// Whether a subject with a bundle predicate exists, in one graph or in
    /// any graph of the entity type
    pub fn id_exists(&self, id: &str, graph_uri: Option<&str>) -> StorageResult<bool> {
        let mapping = self.codec.registry().build(&self.entity_type)?;
        let graph_uris = match graph_uri {
            Some(_) => Vec::new(),
            None => self.resolver.graph_uris_flat(&self.entity_type, None)?,
        };
        let query = update::ask_exists(id, mapping.bundle_predicates(), graph_uri, &graph_uris)?;
        Ok(self.connection.query(&query)?.is_true())
    }

    /// Triples of one subject in one graph, as stored
    pub fn export(&self, record: &Record, graph_id: &str) -> StorageResult<TripleGraph> {
        self.validate_graph_ids(&[graph_id.to_string()])?;
        let mut graph = TripleGraph::new();
        let Some(id) = record.id() else {
            return Ok(graph);
        };
        let graph_uri = self
            .resolver
            .bundle_graph_uri(&self.entity_type, record.bundle(), graph_id)?;
        let query = update::construct_subject(&graph_uri, id)?;
        let triples = self
            .connection
            .query(&query)?
            .into_triples()
            .ok_or(ConnectionError::UnexpectedResult { expected: "triples" })?;
        for triple in triples {
            graph.add(triple.subject, triple.predicate, triple.object);
        }
        Ok(graph)
    }

    /// Map one raw record to a typed record; `None` when its graph URI is
    /// not one of the bundle's graphs
    fn hydrate(&self, mapping: &EntityTypeMapping, raw: &RawRecord) -> StorageResult<Option<Record>> {
        let id = raw.subject();
        let types: Vec<&str> = mapping
            .bundle_predicates()
            .iter()
            .flat_map(|predicate| raw.all(predicate))
            .collect();

        let bundle = match mapping.bundles_for_types(types) {
            BundleMatch::One(bundle) => bundle,
            BundleMatch::None => {
                return Err(StorageError::BundleNotFound {
                    entity_type: self.entity_type.clone(),
                    id: id.to_string(),
                })
            }
            BundleMatch::Ambiguous(bundles) => {
                let resolved = self
                    .bundle_resolver
                    .as_ref()
                    .and_then(|r| r.resolve(&self.entity_type, id, &bundles))
                    .filter(|b| bundles.contains(b));
                match resolved {
                    Some(bundle) => bundle,
                    None => {
                        return Err(StorageError::AmbiguousBundle {
                            id: id.to_string(),
                            bundles,
                        })
                    }
                }
            }
        };

        let Some(graph_id) = self
            .resolver
            .bundle_graph_id(&self.entity_type, &bundle, raw.graph())?
        else {
            warn!("No graph id of bundle '{}' for <{}>, ignoring that copy of {}", bundle, raw.graph(), id);
            return Ok(None);
        };

        let default_langcode = self.config.default_langcode.as_str();
        let mut record = Record::loaded(&self.entity_type, id, &bundle, &graph_id, default_langcode);

        // (field, langcode) → items by delta
        let mut fields: IndexMap<(String, String), Vec<FieldItem>> = IndexMap::new();
        for (predicate, languages) in raw.values() {
            let Some((field, column)) = mapping.inbound(predicate, &bundle) else {
                continue;
            };
            if field == mapping.bundle_key() {
                continue;
            }
            for (langcode, values) in languages {
                let tag = (langcode != LANGCODE_DEFAULT).then_some(langcode.as_str());
                let target = if langcode == default_langcode {
                    LANGCODE_DEFAULT
                } else {
                    langcode.as_str()
                };
                let items = fields.entry((field.to_string(), target.to_string())).or_default();
                for (delta, value) in values.iter().enumerate() {
                    let decoded = self.codec.to_inbound_value(
                        &self.entity_type,
                        field,
                        value,
                        tag,
                        Some(column),
                        Some(&bundle),
                    )?;
                    if items.len() <= delta {
                        items.resize_with(delta + 1, FieldItem::new);
                    }
                    items[delta].insert(column.to_string(), decoded);
                }
            }
        }

        for ((field, langcode), items) in fields {
            record.set_translation_items(&langcode, field, items);
        }

        debug!("Hydrated {} from graph '{}'", id, graph_id);
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_load_missing_returns_none() {
        let storage = storage();
        assert!(storage.load("http://example.com/nothing", None).unwrap().is_none());
    }

    #[test]
    fn test_load_multiple_keeps_request_order() {
        let storage = storage();
        for (id, label) in [("http://example.com/a", "A"), ("http://example.com/b", "B")] {
            let mut record = Record::new("rdf_entity", "fruit").with_id(id);
            record.set_value("label", label);
            storage.save(&mut record).unwrap();
        }

        let outcome = storage
            .load_multiple(&["http://example.com/b", "http://example.com/x", "http://example.com/a"], None)
            .unwrap();
        let ids: Vec<_> = outcome.records.iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec!["http://example.com/b", "http://example.com/a"]);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_translations_are_hydrated() {
        let storage = storage();
        let mut record = apple();
        record.set_translation_value("fr", "label", "Pomme");
        storage.save(&mut record).unwrap();

        let loaded = storage
            .load_unchanged("http://example.com/apple", Some(&["draft".to_string()]))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.value("label"), Some(&FieldValue::from("Apple")));
        assert_eq!(
            loaded.get_translation("label", "fr").unwrap()[0]["value"],
            FieldValue::from("Pomme")
        );
        assert!(loaded.has_translation("fr"));
    }

    #[test]
    fn test_multi_value_field_keeps_all_values() {
        let storage = storage();
        let mut record = apple();
        let items = ["red", "green"]
            .iter()
            .map(|c| {
                let mut item = FieldItem::new();
                item.insert("value".to_string(), FieldValue::from(*c));
                item
            })
            .collect();
        record.set_items("color", items);
        storage.save(&mut record).unwrap();

        let loaded = storage
            .load_unchanged("http://example.com/apple", Some(&["draft".to_string()]))
            .unwrap()
            .unwrap();
        let mut colors: Vec<String> = loaded
            .get("color")
            .unwrap()
            .iter()
            .map(|i| i["value"].to_lexical())
            .collect();
        colors.sort();
        assert_eq!(colors, vec!["green", "red"]);
    }

    #[test]
    fn test_ambiguous_bundle_does_not_abort_batch() {
        let storage = storage();
        storage.save(&mut apple()).unwrap();
        storage
            .connection()
            .update(
                "INSERT DATA { GRAPH <http://example.com/graph/published> {\n\
                 <http://example.com/both> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.com/fruit> .\n\
                 <http://example.com/both> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.com/vegetable> .\n\
                 } }",
            )
            .unwrap();

        let graphs = vec!["draft".to_string(), "default".to_string()];
        let outcome = storage
            .load_multiple(&["http://example.com/both", "http://example.com/apple"], Some(&graphs))
            .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(matches!(
            outcome.errors.get("http://example.com/both"),
            Some(StorageError::AmbiguousBundle { .. })
        ));
        assert!(matches!(
            storage.load("http://example.com/both", Some(&graphs)),
            Err(StorageError::AmbiguousBundle { .. })
        ));
    }

    #[test]
    fn test_load_by_properties() {
        let storage = storage();
        storage.save(&mut apple()).unwrap();
        let graphs = vec!["draft".to_string()];
        let found = storage
            .load_by_properties(&[("label", FieldValue::from("Apple"))], Some(&graphs))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), Some("http://example.com/apple"));
        assert!(storage
            .load_by_properties(&[("label", FieldValue::from("Pear"))], Some(&graphs))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_export_and_id_exists() {
        let storage = storage();
        let mut record = apple();
        storage.save(&mut record).unwrap();

        assert!(storage.id_exists("http://example.com/apple", None).unwrap());
        assert!(!storage
            .id_exists("http://example.com/apple", Some("http://example.com/graph/published"))
            .unwrap());

        let triples = storage.export(&record, "draft").unwrap();
        assert_eq!(triples.len(), 2);
        assert!(storage.export(&record, "default").unwrap().is_empty());
    }
}
