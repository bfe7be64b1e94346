//! Saving records into one graph

use super::{EntityStorage, StorageError, StorageResult};
use crate::entity::{FieldItem, FieldValue, Record, LANGCODE_DEFAULT};
use crate::mapping::EntityTypeMapping;
use crate::query::update;
use crate::rdf::{NamedNode, RdfSubject, TripleGraph};
use tracing::debug;

/// What a save did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    New,
    Updated,
}

impl EntityStorage {
    /// Write the record into its active graph
    ///
    /// New records get an id when they have none and must not collide with an
    /// existing subject. Existing records first lose their mapped predicates
    /// in the target graph; other graphs are left alone.
    pub fn save(&self, record: &mut Record) -> StorageResult<SaveStatus> {
        self.check_record(record)?;
        let mapping = self.codec.registry().build(&self.entity_type)?;
        let bundle = mapping.bundle(record.bundle())?;
        record.adopt_langcode(&self.config.default_langcode);

        let id = match record.id() {
            Some(id) => {
                if record.is_new() && self.id_exists(id, None)? {
                    return Err(StorageError::DuplicateId(id.to_string()));
                }
                id.to_string()
            }
            None => {
                let id = self.id_generator.generate(record, bundle);
                record.set_id(id.clone());
                id
            }
        };

        let graph_id = match record.graph() {
            Some(graph_id) => graph_id.to_string(),
            None => {
                let graph_id = self.resolver.default_graph_id(&self.entity_type)?;
                record.set_graph(graph_id.clone());
                graph_id
            }
        };
        self.validate_graph_ids(&[graph_id.clone()])?;
        let graph_uri = self
            .resolver
            .bundle_graph_uri(&self.entity_type, record.bundle(), &graph_id)?;

        let mut triples = self.build_graph(&mapping, record, &id)?;
        for alter in &self.graph_alters {
            alter.alter(record, &graph_uri, &mut triples);
        }

        let dialect = self.connection.dialect();
        let status = if record.is_new() {
            SaveStatus::New
        } else {
            let query = update::delete_predicates(dialect, &graph_uri, &id, &mapping.property_list())?;
            self.connection.update(&query)?;
            SaveStatus::Updated
        };
        if !triples.is_empty() {
            self.connection.update(&update::insert_data(dialect, &graph_uri, &triples)?)?;
        }
        debug!("Saved {} ({} triples) into '{}'", id, triples.len(), graph_id);

        record.track_original_graph();
        record.enforce_is_new(false);
        // a cached copy may be keyed under any graph the record was loaded through
        let graph_ids = self.resolver.entity_type_graph_ids(&self.entity_type)?;
        self.cache.invalidate(&self.entity_type, &[id.as_str()], &graph_ids)?;

        Ok(status)
    }

    /// Triples for every mapped, non-empty value across the record's languages
    fn build_graph(&self, mapping: &EntityTypeMapping, record: &Record, id: &str) -> StorageResult<TripleGraph> {
        let subject: RdfSubject = NamedNode::new(id)?.into();
        let bundle = record.bundle();
        let langcode = record.langcode().unwrap_or(self.config.default_langcode.as_str());
        let mut triples = TripleGraph::new();

        let bundle_key = mapping.bundle_key();
        let column = mapping.column(bundle, bundle_key, None)?;
        let term = self.codec.to_outbound_term(
            &self.entity_type,
            bundle_key,
            &FieldValue::from(bundle),
            None,
            None,
            Some(bundle),
        )?;
        triples.add(subject.clone(), NamedNode::new(column.predicate.as_str())?, term);

        for (field, languages) in record.field_languages() {
            if field == bundle_key {
                continue;
            }
            let Ok(info) = mapping.field(bundle, field) else {
                debug!("Field '{}' has no mapping in bundle '{}', not stored", field, bundle);
                continue;
            };

            // default translation carries every field, tagged with the record language
            let mut variants: Vec<(&str, &[FieldItem])> = Vec::new();
            if let Some(items) = languages.get(LANGCODE_DEFAULT) {
                variants.push((langcode, items.as_slice()));
            }
            if info.translatable {
                for langcode in record.translations() {
                    if let Some(items) = languages.get(langcode) {
                        variants.push((langcode, items.as_slice()));
                    }
                }
            }

            for (langcode, items) in variants {
                for item in items {
                    for (column, value) in item {
                        if value.is_empty() {
                            continue;
                        }
                        let Some(column_info) = info.columns.get(column) else {
                            continue;
                        };
                        let term = self.codec.to_outbound_term(
                            &self.entity_type,
                            field,
                            value,
                            Some(langcode),
                            Some(column.as_str()),
                            Some(bundle),
                        )?;
                        triples.add(subject.clone(), NamedNode::new(column_info.predicate.as_str())?, term);
                    }
                }
            }
        }

        Ok(triples)
    }
}
