//! Field mapping registry
//!
//! Translates (field, column, bundle) to predicates and back for one entity
//! type. The maps are built from configuration the first time an entity type
//! is used and then shared behind an `Arc` until [`FieldMappingRegistry::reset`].

use super::format::ValueFormat;
use crate::config::{ColumnMapping, EngineConfig, FieldDefinition};
use crate::rdf::NamedNode;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;

/// Mapping errors. All of them point at configuration defects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Bundle '{bundle}' of '{entity_type}' has no RDF type configured")]
    MissingRdfType { entity_type: String, bundle: String },

    #[error("Field '{field}' of bundle '{bundle}' maps column '{column}' which the field does not declare")]
    UndeclaredColumn {
        bundle: String,
        field: String,
        column: String,
    },

    #[error("Bundle '{bundle}' maps base field '{field}' which '{entity_type}' does not define")]
    UndeclaredField {
        entity_type: String,
        bundle: String,
        field: String,
    },

    #[error("Predicate <{predicate}> is mapped twice in bundle '{bundle}' ({first} and {second})")]
    DuplicatePredicate {
        bundle: String,
        predicate: String,
        first: String,
        second: String,
    },

    #[error("Invalid predicate IRI '{0}'")]
    InvalidPredicate(String),

    #[error("You are requesting the mapping for a non mapped field: {field}")]
    UnmappedField { entity_type: String, field: String },

    #[error("Bundle '{bundle}' does not exist for entity type '{entity_type}'")]
    UnknownBundle { entity_type: String, bundle: String },

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

pub type MappingResult<T> = Result<T, MappingError>;

/// Storage details of one column in one bundle
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub predicate: String,
    pub format: ValueFormat,
    pub serialize: bool,
    /// Declared column data type (`string`, `integer`, `timestamp`, …)
    pub data_type: String,
}

/// A field as mapped in one bundle
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub translatable: bool,
    pub main_property: String,
    pub columns: IndexMap<String, ColumnInfo>,
}

/// Per-bundle outbound map
#[derive(Debug, Clone, PartialEq)]
pub struct BundleMapping {
    pub id: String,
    pub rdf_type: String,
    pub fields: IndexMap<String, FieldInfo>,
    pub entity_id_base: Option<String>,
}

/// Result of resolving an RDF type to bundles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleMatch {
    None,
    One(String),
    Ambiguous(Vec<String>),
}

impl BundleMatch {
    fn from_candidates(mut bundles: Vec<String>) -> Self {
        match bundles.len() {
            0 => BundleMatch::None,
            1 => BundleMatch::One(bundles.remove(0)),
            _ => BundleMatch::Ambiguous(bundles),
        }
    }
}

/// Both directions of the mapping for one entity type
#[derive(Debug, Clone)]
pub struct EntityTypeMapping {
    entity_type: String,
    bundle_key: String,
    bundle_predicates: Vec<String>,
    bundles: IndexMap<String, BundleMapping>,
    /// (predicate, bundle) → (field, column)
    inbound: HashMap<(String, String), (String, String)>,
    /// RDF type URI → bundles
    type_bundles: IndexMap<String, Vec<String>>,
    /// Every predicate mapped by any bundle
    predicates: IndexSet<String>,
}

impl EntityTypeMapping {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn bundle_key(&self) -> &str {
        &self.bundle_key
    }

    /// Predicates whose objects identify the bundle
    pub fn bundle_predicates(&self) -> &[String] {
        &self.bundle_predicates
    }

    pub fn bundle(&self, bundle: &str) -> MappingResult<&BundleMapping> {
        self.bundles
            .get(bundle)
            .ok_or_else(|| MappingError::UnknownBundle {
                entity_type: self.entity_type.clone(),
                bundle: bundle.to_string(),
            })
    }

    pub fn bundles(&self) -> impl Iterator<Item = &BundleMapping> {
        self.bundles.values()
    }

    /// Field info for a bundle, `UnmappedField` if the bundle lacks it
    pub fn field(&self, bundle: &str, field: &str) -> MappingResult<&FieldInfo> {
        self.bundle(bundle)?
            .fields
            .get(field)
            .ok_or_else(|| self.unmapped(field))
    }

    /// Column info; `None` picks the field's main property
    pub fn column(&self, bundle: &str, field: &str, column: Option<&str>) -> MappingResult<&ColumnInfo> {
        let info = self.field(bundle, field)?;
        let column = column.unwrap_or(info.main_property.as_str());
        info.columns.get(column).ok_or_else(|| self.unmapped(field))
    }

    /// True if any bundle maps the field
    pub fn is_mapped(&self, field: &str) -> bool {
        self.bundles.values().any(|b| b.fields.contains_key(field))
    }

    /// Predicates of a field column, for one bundle or across all bundles
    pub fn field_predicates(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> MappingResult<Vec<String>> {
        if !self.is_mapped(field) {
            return Err(self.unmapped(field));
        }
        let mut out = IndexSet::new();
        for mapping in self.bundles.values() {
            if bundle.map_or(false, |b| b != mapping.id) {
                continue;
            }
            if let Some(info) = mapping.fields.get(field) {
                let column = column.unwrap_or(info.main_property.as_str());
                if let Some(col) = info.columns.get(column) {
                    out.insert(col.predicate.clone());
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    /// Formats of a field column, for one bundle or across all bundles
    pub fn field_formats(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> MappingResult<Vec<ValueFormat>> {
        if !self.is_mapped(field) {
            return Err(self.unmapped(field));
        }
        let mut out = Vec::new();
        for mapping in self.bundles.values() {
            if bundle.map_or(false, |b| b != mapping.id) {
                continue;
            }
            if let Some(info) = mapping.fields.get(field) {
                let column = column.unwrap_or(info.main_property.as_str());
                if let Some(col) = info.columns.get(column) {
                    if !out.contains(&col.format) {
                        out.push(col.format.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    /// Declared data type of a field column in one bundle
    pub fn field_data_type(&self, bundle: &str, field: &str, column: Option<&str>) -> MappingResult<&str> {
        Ok(self.column(bundle, field, column)?.data_type.as_str())
    }

    /// Main property of a field (first bundle that maps it)
    pub fn main_property(&self, field: &str) -> MappingResult<&str> {
        self.bundles
            .values()
            .find_map(|b| b.fields.get(field))
            .map(|f| f.main_property.as_str())
            .ok_or_else(|| self.unmapped(field))
    }

    pub fn has_field_predicate(&self, bundle: &str, field: &str, column: &str) -> bool {
        self.bundles
            .get(bundle)
            .and_then(|b| b.fields.get(field))
            .map_or(false, |f| f.columns.contains_key(column))
    }

    /// Inbound lookup: (predicate, bundle) → (field, column)
    pub fn inbound(&self, predicate: &str, bundle: &str) -> Option<(&str, &str)> {
        self.inbound
            .get(&(predicate.to_string(), bundle.to_string()))
            .map(|(f, c)| (f.as_str(), c.as_str()))
    }

    /// Every predicate mapped by this entity type, de-duplicated
    pub fn property_list(&self) -> Vec<String> {
        self.predicates.iter().cloned().collect()
    }

    pub fn bundle_rdf_type(&self, bundle: &str) -> MappingResult<&str> {
        Ok(self.bundle(bundle)?.rdf_type.as_str())
    }

    /// Bundles declaring this RDF type
    pub fn inbound_bundle_value(&self, rdf_type: &str) -> BundleMatch {
        BundleMatch::from_candidates(self.type_bundles.get(rdf_type).cloned().unwrap_or_default())
    }

    /// Bundles matching any of the given RDF types, in first-seen order
    pub fn bundles_for_types<'a>(&self, rdf_types: impl IntoIterator<Item = &'a str>) -> BundleMatch {
        let mut bundles: Vec<String> = Vec::new();
        for rdf_type in rdf_types {
            for bundle in self.type_bundles.get(rdf_type).into_iter().flatten() {
                if !bundles.contains(bundle) {
                    bundles.push(bundle.clone());
                }
            }
        }
        BundleMatch::from_candidates(bundles)
    }

    /// RDF type URIs for the given bundles; all bundles when empty
    pub fn bundles_to_uris(&self, bundles: &[String]) -> Vec<String> {
        let mut out = IndexSet::new();
        for mapping in self.bundles.values() {
            if bundles.is_empty() || bundles.contains(&mapping.id) {
                out.insert(mapping.rdf_type.clone());
            }
        }
        out.into_iter().collect()
    }

    fn unmapped(&self, field: &str) -> MappingError {
        MappingError::UnmappedField {
            entity_type: self.entity_type.clone(),
            field: field.to_string(),
        }
    }
}

/// Lazily built, shared mappings for every configured entity type
pub struct FieldMappingRegistry {
    config: Arc<EngineConfig>,
    mappings: RwLock<HashMap<String, Arc<EntityTypeMapping>>>,
}

impl FieldMappingRegistry {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            mappings: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mapping for an entity type, built on first use
    pub fn build(&self, entity_type: &str) -> MappingResult<Arc<EntityTypeMapping>> {
        {
            let mappings = self.mappings.read().map_err(|_| MappingError::LockPoisoned)?;
            if let Some(mapping) = mappings.get(entity_type) {
                return Ok(Arc::clone(mapping));
            }
        }

        let mapping = Arc::new(self.build_uncached(entity_type)?);
        let mut mappings = self.mappings.write().map_err(|_| MappingError::LockPoisoned)?;
        // another thread may have won the race; keep the first one
        Ok(Arc::clone(
            mappings
                .entry(entity_type.to_string())
                .or_insert(mapping),
        ))
    }

    /// Drop cached mappings, for one entity type or all of them
    pub fn reset(&self, entity_type: Option<&str>) {
        if let Ok(mut mappings) = self.mappings.write() {
            match entity_type {
                Some(entity_type) => {
                    mappings.remove(entity_type);
                }
                None => mappings.clear(),
            }
        }
    }

    pub fn field_predicates(
        &self,
        entity_type: &str,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> MappingResult<Vec<String>> {
        self.build(entity_type)?.field_predicates(field, column, bundle)
    }

    pub fn property_list(&self, entity_type: &str) -> MappingResult<Vec<String>> {
        Ok(self.build(entity_type)?.property_list())
    }

    fn build_uncached(&self, entity_type: &str) -> MappingResult<EntityTypeMapping> {
        let type_config = self
            .config
            .entity_types
            .get(entity_type)
            .ok_or_else(|| MappingError::UnknownEntityType(entity_type.to_string()))?;
        let namespaces = self.config.namespaces();

        let bundle_predicates: Vec<String> = type_config
            .bundle_predicates
            .iter()
            .map(|p| checked_predicate(&namespaces.resolve(p)))
            .collect::<MappingResult<_>>()?;

        let mut mapping = EntityTypeMapping {
            entity_type: entity_type.to_string(),
            bundle_key: type_config.bundle_key.clone(),
            bundle_predicates: bundle_predicates.clone(),
            bundles: IndexMap::new(),
            inbound: HashMap::new(),
            type_bundles: IndexMap::new(),
            predicates: IndexSet::new(),
        };

        for (bundle_id, bundle) in &type_config.bundles {
            let rdf_type = match bundle.rdf_type.as_deref() {
                Some(t) if !t.is_empty() => checked_predicate(&namespaces.resolve(t))?,
                _ => {
                    return Err(MappingError::MissingRdfType {
                        entity_type: entity_type.to_string(),
                        bundle: bundle_id.clone(),
                    })
                }
            };

            let mut fields: IndexMap<String, FieldInfo> = IndexMap::new();

            // bundle key → rdf:type, stored as a resource
            let mut bundle_columns = IndexMap::new();
            bundle_columns.insert(
                "value".to_string(),
                ColumnInfo {
                    predicate: bundle_predicates[0].clone(),
                    format: ValueFormat::Resource,
                    serialize: false,
                    data_type: "string".to_string(),
                },
            );
            fields.insert(
                type_config.bundle_key.clone(),
                FieldInfo {
                    translatable: false,
                    main_property: "value".to_string(),
                    columns: bundle_columns,
                },
            );

            for (field, columns) in &bundle.base_fields_mapping {
                let definition = type_config.base_fields.get(field).ok_or_else(|| {
                    MappingError::UndeclaredField {
                        entity_type: entity_type.to_string(),
                        bundle: bundle_id.clone(),
                        field: field.clone(),
                    }
                })?;
                let info = field_info(bundle_id, field, definition, columns, &namespaces)?;
                fields.insert(field.clone(), info);
            }

            for (field, field_config) in &bundle.fields {
                let info = field_info(
                    bundle_id,
                    field,
                    &field_config.definition,
                    &field_config.mapping,
                    &namespaces,
                )?;
                fields.insert(field.clone(), info);
            }

            for (field, info) in &fields {
                for (column, col) in &info.columns {
                    let key = (col.predicate.clone(), bundle_id.clone());
                    if let Some((f, c)) = mapping.inbound.get(&key) {
                        return Err(MappingError::DuplicatePredicate {
                            bundle: bundle_id.clone(),
                            predicate: col.predicate.clone(),
                            first: format!("{}.{}", f, c),
                            second: format!("{}.{}", field, column),
                        });
                    }
                    mapping.inbound.insert(key, (field.clone(), column.clone()));
                    mapping.predicates.insert(col.predicate.clone());
                }
            }

            mapping
                .type_bundles
                .entry(rdf_type.clone())
                .or_default()
                .push(bundle_id.clone());

            mapping.bundles.insert(
                bundle_id.clone(),
                BundleMapping {
                    id: bundle_id.clone(),
                    rdf_type,
                    fields,
                    entity_id_base: bundle.entity_id_base.clone(),
                },
            );
        }

        info!(
            "Built field mapping for '{}': {} bundles, {} predicates",
            entity_type,
            mapping.bundles.len(),
            mapping.predicates.len()
        );
        Ok(mapping)
    }
}

fn checked_predicate(iri: &str) -> MappingResult<String> {
    NamedNode::new(iri)
        .map(|n| n.as_str().to_string())
        .map_err(|_| MappingError::InvalidPredicate(iri.to_string()))
}

fn field_info(
    bundle: &str,
    field: &str,
    definition: &FieldDefinition,
    columns: &IndexMap<String, ColumnMapping>,
    namespaces: &crate::rdf::NamespaceManager,
) -> MappingResult<FieldInfo> {
    let mut out = IndexMap::new();
    for (column, column_mapping) in columns {
        let declared = definition
            .columns
            .get(column)
            .ok_or_else(|| MappingError::UndeclaredColumn {
                bundle: bundle.to_string(),
                field: field.to_string(),
                column: column.clone(),
            })?;
        // an empty predicate leaves the column unmapped
        if column_mapping.predicate.is_empty() {
            continue;
        }
        out.insert(
            column.clone(),
            ColumnInfo {
                predicate: checked_predicate(&namespaces.resolve(&column_mapping.predicate))?,
                format: ValueFormat::parse(&column_mapping.format, namespaces),
                serialize: column_mapping.serialize,
                data_type: declared.data_type.clone(),
            },
        );
    }
    Ok(FieldInfo {
        translatable: definition.translatable,
        main_property: definition.main_property.clone(),
        columns: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::RDF_TYPE;

    const YAML: &str = r#"
graphs:
  - id: default
entity_types:
  rdf_entity:
    base_fields:
      label:
        translatable: true
    bundles:
      fruit:
        rdf_type: http://example.com/fruit
        graphs:
          default: http://example.com/fruit/published
        base_fields_mapping:
          label:
            value:
              predicate: rdfs:label
              format: t_literal
        fields:
          weight:
            columns:
              value:
                data_type: integer
            mapping:
              value:
                predicate: http://example.com/weight
                format: xsd:integer
          dimensions:
            main_property: width
            columns:
              width:
                data_type: integer
              height:
                data_type: integer
            mapping:
              width:
                predicate: http://example.com/width
                format: xsd:integer
              height:
                predicate: http://example.com/height
                format: xsd:integer
      vegetable:
        rdf_type: http://example.com/vegetable
        graphs:
          default: http://example.com/vegetable/published
        base_fields_mapping:
          label:
            value:
              predicate: http://purl.org/dc/terms/title
              format: t_literal
"#;

    fn registry(yaml: &str) -> FieldMappingRegistry {
        FieldMappingRegistry::new(Arc::new(EngineConfig::from_yaml_str(yaml).unwrap()))
    }

    #[test]
    fn test_build_is_cached() {
        let registry = registry(YAML);
        let a = registry.build("rdf_entity").unwrap();
        let b = registry.build("rdf_entity").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.reset(Some("rdf_entity"));
        let c = registry.build("rdf_entity").unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_field_predicates_across_bundles() {
        let registry = registry(YAML);
        let all = registry.field_predicates("rdf_entity", "label", None, None).unwrap();
        assert_eq!(
            all,
            vec![
                "http://www.w3.org/2000/01/rdf-schema#label".to_string(),
                "http://purl.org/dc/terms/title".to_string()
            ]
        );

        let fruit = registry
            .field_predicates("rdf_entity", "label", None, Some("fruit"))
            .unwrap();
        assert_eq!(fruit.len(), 1);

        let err = registry.field_predicates("rdf_entity", "colour", None, None).unwrap_err();
        assert!(matches!(err, MappingError::UnmappedField { .. }));
    }

    #[test]
    fn test_main_property_and_columns() {
        let mapping = registry(YAML).build("rdf_entity").unwrap();
        assert_eq!(mapping.main_property("dimensions").unwrap(), "width");
        let height = mapping.column("fruit", "dimensions", Some("height")).unwrap();
        assert_eq!(height.predicate, "http://example.com/height");
        assert_eq!(height.data_type, "integer");
        assert!(mapping.has_field_predicate("fruit", "weight", "value"));
        assert!(!mapping.has_field_predicate("vegetable", "weight", "value"));
    }

    #[test]
    fn test_inbound_map_and_bundle_key() {
        let mapping = registry(YAML).build("rdf_entity").unwrap();
        assert_eq!(
            mapping.inbound("http://example.com/weight", "fruit"),
            Some(("weight", "value"))
        );
        assert_eq!(mapping.inbound(RDF_TYPE, "vegetable"), Some(("rid", "value")));
        assert_eq!(mapping.inbound("http://example.com/weight", "vegetable"), None);
        assert_eq!(
            mapping.inbound_bundle_value("http://example.com/fruit"),
            BundleMatch::One("fruit".to_string())
        );
        assert_eq!(mapping.inbound_bundle_value("http://example.com/rock"), BundleMatch::None);
    }

    #[test]
    fn test_property_list_is_deduplicated() {
        let list = registry(YAML).property_list("rdf_entity").unwrap();
        assert_eq!(list.iter().filter(|p| p.as_str() == RDF_TYPE).count(), 1);
        assert!(list.contains(&"http://example.com/height".to_string()));
        assert_eq!(list.len(), 6);
    }

    #[test]
    fn test_shared_type_is_ambiguous() {
        let yaml = YAML.replace("http://example.com/vegetable\n", "http://example.com/fruit\n");
        let mapping = registry(&yaml).build("rdf_entity").unwrap();
        assert_eq!(
            mapping.inbound_bundle_value("http://example.com/fruit"),
            BundleMatch::Ambiguous(vec!["fruit".to_string(), "vegetable".to_string()])
        );
    }

    #[test]
    fn test_missing_rdf_type() {
        let yaml = YAML.replace("rdf_type: http://example.com/vegetable", "rdf_type: ''");
        let err = registry(&yaml).build("rdf_entity").unwrap_err();
        assert!(matches!(err, MappingError::MissingRdfType { ref bundle, .. } if bundle == "vegetable"));
    }

    #[test]
    fn test_undeclared_column() {
        let yaml = YAML.replace(
            "              height:\n                predicate",
            "              depth:\n                predicate",
        );
        let err = registry(&yaml).build("rdf_entity").unwrap_err();
        assert!(matches!(err, MappingError::UndeclaredColumn { ref column, .. } if column == "depth"));
    }

    #[test]
    fn test_duplicate_predicate_in_bundle() {
        let yaml = YAML.replace("http://example.com/height", "http://example.com/width");
        let err = registry(&yaml).build("rdf_entity").unwrap_err();
        assert!(matches!(err, MappingError::DuplicatePredicate { .. }));
    }

    #[test]
    fn test_unknown_entity_type() {
        assert!(matches!(
            registry(YAML).build("node"),
            Err(MappingError::UnknownEntityType(_))
        ));
    }
}
