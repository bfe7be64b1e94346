//! Engine configuration
//!
//! Loaded from YAML. Holds the connection settings, cache settings, the graph
//! definitions and the per entity type bundle/field mapping.
//!
//! ```yaml
//! default_langcode: en
//! connection:
//!   endpoint: http://localhost:8890/sparql
//!   dialect: virtuoso
//! graphs:
//!   - id: default
//!     name: Published
//!   - id: draft
//!     weight: 10
//! entity_types:
//!   rdf_entity:
//!     base_fields:
//!       label:
//!         translatable: true
//!     bundles:
//!       fruit:
//!         rdf_type: http://example.com/fruit
//!         graphs:
//!           default: http://example.com/fruit/published
//!           draft: http://example.com/fruit/draft
//!         base_fields_mapping:
//!           label:
//!             value:
//!               predicate: rdfs:label
//!               format: t_literal
//! ```

use crate::rdf::{NamespaceManager, RDF_TYPE};
use crate::sparql::SparqlDialect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Id of the graph every entity type must have
pub const DEFAULT_GRAPH: &str = "default";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_langcode() -> String {
    "en".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Site default language; values in this language are stored under `x-default`
    #[serde(default = "default_langcode")]
    pub default_langcode: String,
    /// Ids per bulk-fetch query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Extra namespace prefixes usable in mapping config
    #[serde(default)]
    pub prefixes: IndexMap<String, String>,
    pub graphs: Vec<GraphDefinition>,
    #[serde(default)]
    pub entity_types: IndexMap<String, EntityTypeConfig>,
}

/// Triple store endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub endpoint: String,
    /// Separate update endpoint, when the store splits them
    pub update_endpoint: Option<String>,
    pub dialect: SparqlDialect,
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8890/sparql".to_string(),
            update_endpoint: None,
            dialect: SparqlDialect::default(),
            timeout_secs: 30,
        }
    }
}

/// Two-tier cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub static_enabled: bool,
    #[serde(default = "CacheConfig::default_capacity")]
    pub static_capacity: usize,
    #[serde(default = "default_true")]
    pub persistent_enabled: bool,
    /// RocksDB directory; the persistent tier stays in memory when unset
    #[serde(default)]
    pub persistent_path: Option<PathBuf>,
}

impl CacheConfig {
    fn default_capacity() -> usize {
        1024
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_enabled: true,
            static_capacity: Self::default_capacity(),
            persistent_enabled: true,
            persistent_path: None,
        }
    }
}

/// A named graph partition (published, draft, …)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Lower weight = higher priority among defaults
    #[serde(default)]
    pub weight: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Restrict to these entity types; `None` means all
    #[serde(default)]
    pub entity_types: Option<Vec<String>>,
}

impl GraphDefinition {
    pub fn new(id: impl Into<String>, weight: i32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            weight,
            enabled: true,
            entity_types: None,
        }
    }

    /// The default graph applies everywhere regardless of restrictions
    pub fn applies_to(&self, entity_type: &str) -> bool {
        if self.id == DEFAULT_GRAPH {
            return true;
        }
        match &self.entity_types {
            Some(types) => types.iter().any(|t| t == entity_type),
            None => true,
        }
    }
}

fn default_bundle_key() -> String {
    "rid".to_string()
}

fn default_bundle_predicates() -> Vec<String> {
    vec![RDF_TYPE.to_string()]
}

/// One entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeConfig {
    /// Field holding the bundle name
    #[serde(default = "default_bundle_key")]
    pub bundle_key: String,
    /// Predicates whose objects identify the bundle
    #[serde(default = "default_bundle_predicates")]
    pub bundle_predicates: Vec<String>,
    /// Fields shared by every bundle; mapped per bundle in `base_fields_mapping`
    #[serde(default)]
    pub base_fields: IndexMap<String, FieldDefinition>,
    #[serde(default)]
    pub bundles: IndexMap<String, BundleConfig>,
}

impl Default for EntityTypeConfig {
    fn default() -> Self {
        Self {
            bundle_key: default_bundle_key(),
            bundle_predicates: default_bundle_predicates(),
            base_fields: IndexMap::new(),
            bundles: IndexMap::new(),
        }
    }
}

fn default_main_property() -> String {
    "value".to_string()
}

fn default_columns() -> IndexMap<String, ColumnDefinition> {
    let mut columns = IndexMap::new();
    columns.insert("value".to_string(), ColumnDefinition::default());
    columns
}

/// Field storage definition: its columns and translatability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(default)]
    pub translatable: bool,
    #[serde(default = "default_main_property")]
    pub main_property: String,
    #[serde(default = "default_columns")]
    pub columns: IndexMap<String, ColumnDefinition>,
}

impl Default for FieldDefinition {
    fn default() -> Self {
        Self {
            translatable: false,
            main_property: default_main_property(),
            columns: default_columns(),
        }
    }
}

fn default_data_type() -> String {
    "string".to_string()
}

/// Declared property of a field column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// `string`, `integer`, `float`, `decimal`, `boolean`, `timestamp`, `uri`, …
    #[serde(default = "default_data_type")]
    pub data_type: String,
}

impl Default for ColumnDefinition {
    fn default() -> Self {
        Self {
            data_type: default_data_type(),
        }
    }
}

fn default_format() -> String {
    "literal".to_string()
}

/// Where a column is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub predicate: String,
    /// `resource`, `t_literal`, `literal`, or an XSD datatype IRI
    #[serde(default = "default_format")]
    pub format: String,
    /// Store the value as an opaque serialized blob
    #[serde(default)]
    pub serialize: bool,
}

/// Bundle-level field: definition plus mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFieldConfig {
    #[serde(flatten)]
    pub definition: FieldDefinition,
    #[serde(default)]
    pub mapping: IndexMap<String, ColumnMapping>,
}

/// One bundle of an entity type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleConfig {
    #[serde(default)]
    pub rdf_type: Option<String>,
    /// GraphId → graph URI for this bundle
    #[serde(default)]
    pub graphs: IndexMap<String, String>,
    #[serde(default)]
    pub base_fields_mapping: IndexMap<String, IndexMap<String, ColumnMapping>>,
    #[serde(default)]
    pub fields: IndexMap<String, BundleFieldConfig>,
    /// Prefix for generated ids
    #[serde(default)]
    pub entity_id_base: Option<String>,
}

impl EngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for graph in &self.graphs {
            if !seen.insert(graph.id.as_str()) {
                return Err(ConfigError::Invalid(format!("Duplicate graph id '{}'", graph.id)));
            }
        }

        match self.graph(DEFAULT_GRAPH) {
            None => {
                return Err(ConfigError::Invalid(
                    "The 'default' graph must be defined".to_string(),
                ))
            }
            Some(graph) if !graph.enabled => {
                return Err(ConfigError::Invalid(
                    "The 'default' graph cannot be disabled".to_string(),
                ))
            }
            Some(_) => {}
        }

        for (type_id, entity_type) in &self.entity_types {
            if entity_type.bundle_predicates.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Entity type '{}' has no bundle predicate",
                    type_id
                )));
            }
            for (bundle_id, bundle) in &entity_type.bundles {
                if !bundle.graphs.contains_key(DEFAULT_GRAPH) {
                    return Err(ConfigError::Invalid(format!(
                        "Bundle '{}' of '{}' has no URI for the 'default' graph",
                        bundle_id, type_id
                    )));
                }
                if let Some(unknown) = bundle.graphs.keys().find(|g| self.graph(g).is_none()) {
                    return Err(ConfigError::Invalid(format!(
                        "Bundle '{}' of '{}' maps unknown graph '{}'",
                        bundle_id, type_id, unknown
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a graph definition by id
    pub fn graph(&self, id: &str) -> Option<&GraphDefinition> {
        self.graphs.iter().find(|g| g.id == id)
    }

    /// Namespace manager with the configured extra prefixes
    pub fn namespaces(&self) -> NamespaceManager {
        let mut ns = NamespaceManager::new();
        for (prefix, iri) in &self.prefixes {
            ns.add_prefix(prefix.clone(), iri.clone());
        }
        ns
    }
}
