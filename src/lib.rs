//! RDF Entity
//!
//! Stores typed records (entities made of named fields) in an RDF triple store
//! reached over SPARQL, and reads them back.
//!
//! # Architecture
//!
//! - [`config`]: YAML engine configuration (graphs, bundles, field mappings)
//! - [`rdf`]: terms, triples, prefixes and N-Triples/Turtle I/O
//! - [`sparql`]: the [`Connection`] boundary and its HTTP and in-memory implementations
//! - [`mapping`]: field ⇄ predicate registry and the value codec
//! - [`resolver`]: graph ids ⇄ per-bundle graph URIs, default graph order
//! - [`entity`]: records, field values, raw triple capture and priority merge
//! - [`query`]: entity queries and the update/fetch statement builders
//! - [`storage`]: load, save and delete orchestration with a two-tier cache
//!
//! A record may live in several named graphs at once (published, draft, …).
//! Loads take a priority-ordered list of candidate graphs and return the copy
//! from the first graph holding the subject. Saves and deletes always target
//! exactly one graph.
//!
//! ## Example Usage
//!
//! ```rust
//! use rdf_entity::{EngineConfig, EntityStorage, MemoryConnection, Record};
//! use std::sync::Arc;
//!
//! let config = EngineConfig::from_yaml_str(r#"
//! graphs:
//!   - id: default
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
//!           default: http://example.com/graph/published
//!           draft: http://example.com/graph/draft
//!         base_fields_mapping:
//!           label:
//!             value:
//!               predicate: rdfs:label
//!               format: t_literal
//! "#).unwrap();
//!
//! let storage = EntityStorage::builder(config)
//!     .connection(Arc::new(MemoryConnection::new().unwrap()))
//!     .build("rdf_entity")
//!     .unwrap();
//!
//! let mut apple = Record::new("rdf_entity", "fruit")
//!     .with_id("http://example.com/apple")
//!     .with_graph("draft");
//! apple.set_value("label", "Apple");
//! storage.save(&mut apple).unwrap();
//!
//! let candidates = vec!["default".to_string(), "draft".to_string()];
//! let loaded = storage.load("http://example.com/apple", Some(&candidates)).unwrap().unwrap();
//! assert_eq!(loaded.graph(), Some("draft"));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod entity;
pub mod mapping;
pub mod query;
pub mod rdf;
pub mod resolver;
pub mod sparql;
pub mod storage;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, EngineConfig, GraphDefinition, DEFAULT_GRAPH};

pub use entity::{FieldItem, FieldValue, RawRecord, RawRepository, Record, LANGCODE_DEFAULT};

pub use mapping::{
    BundleMatch, CodecError, FieldMappingRegistry, MappingError, TimestampDateHook, ValueCodec,
    ValueFormat, ValueHook,
};

pub use query::{Condition, ConditionGroup, EntityQuery, Operator, QueryBuildError, SortDirection};

pub use resolver::{ConfigGraphResolver, DefaultGraphsHook, GraphError, GraphResolver};

pub use sparql::{
    Connection, ConnectionError, HttpConnection, MemoryConnection, QueryResults, QuerySolution,
    SparqlArg, SparqlDialect,
};

pub use storage::{
    BundleResolver, EntityStorage, GraphAlter, IdGenerator, LoadOutcome, SaveStatus,
    StorageBuilder, StorageError, StorageResult, TwoTierCache, UuidIdGenerator,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
