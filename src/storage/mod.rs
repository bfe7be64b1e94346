//! Entity storage orchestrator
//!
//! [`EntityStorage`] ties the mapping registry, the graph resolver, the value
//! codec and the two-tier cache to a [`Connection`]:
//!
//! - load: candidate graphs in priority order, cache first, one bulk fetch per batch
//! - save: id generation, duplicate check, delete-then-insert into one graph
//! - delete: full subject removal per graph URI, or from a single graph
//!
//! Delete-then-insert runs as two statements; a crash in between leaves the
//! subject without its mapped predicates in that graph until the next save.

mod cache;
mod delete;
mod id;
mod load;
mod persistent;
mod save;

pub use cache::TwoTierCache;
pub use id::{IdGenerator, UuidIdGenerator, DEFAULT_ID_BASE};
pub use load::LoadOutcome;
pub use persistent::{CacheBackend, CacheError, CacheResult, MemoryCacheBackend, RocksDbCacheBackend};
pub use save::SaveStatus;

use crate::config::EngineConfig;
use crate::entity::Record;
use crate::mapping::{CodecError, FieldMappingRegistry, MappingError, ValueCodec};
use crate::query::{EntityQuery, QueryBuildError};
use crate::rdf::{RdfError, TripleGraph};
use crate::resolver::{ConfigGraphResolver, GraphError, GraphResolver};
use crate::sparql::{Connection, ConnectionError, HttpConnection};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Graph id not registered for the entity type
    #[error("Graph '{graph_id}' doesn't exist for entity type '{entity_type}'.")]
    InvalidGraph { graph_id: String, entity_type: String },

    /// Create collided with an existing subject
    #[error("Attempted to create a new entity with an id that already exists: {0}")]
    DuplicateId(String),

    /// More than one bundle matches the type triples of a subject
    #[error("Entity '{id}' matches more than one bundle: {}", bundles.join(", "))]
    AmbiguousBundle { id: String, bundles: Vec<String> },

    /// No bundle matches the type triples of a subject
    #[error("No bundle of '{entity_type}' matches the types of entity '{id}'")]
    BundleNotFound { entity_type: String, id: String },

    #[error("Storage for '{expected}' cannot handle records of type '{found}'")]
    WrongEntityType { expected: String, found: String },

    #[error("Graph ids can only be reset together with entity ids")]
    GraphsWithoutIds,

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Query error: {0}")]
    QueryBuild(#[from] QueryBuildError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("RDF error: {0}")]
    Rdf(#[from] RdfError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Picks one bundle when a loaded subject matches several
pub trait BundleResolver: Send + Sync {
    /// `None` leaves the subject ambiguous
    fn resolve(&self, entity_type: &str, id: &str, bundles: &[String]) -> Option<String>;
}

/// Last chance to change the triples of a record before they are inserted
pub trait GraphAlter: Send + Sync {
    fn alter(&self, record: &Record, graph_uri: &str, triples: &mut TripleGraph);
}

/// Storage for one entity type
///
/// Cloning is cheap; every collaborator is shared.
#[derive(Clone)]
pub struct EntityStorage {
    entity_type: String,
    config: Arc<EngineConfig>,
    connection: Arc<dyn Connection>,
    resolver: Arc<dyn GraphResolver>,
    codec: Arc<ValueCodec>,
    cache: Arc<TwoTierCache>,
    id_generator: Arc<dyn IdGenerator>,
    bundle_resolver: Option<Arc<dyn BundleResolver>>,
    graph_alters: Vec<Arc<dyn GraphAlter>>,
}

impl EntityStorage {
    pub fn builder(config: EngineConfig) -> StorageBuilder {
        StorageBuilder::new(config)
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn resolver(&self) -> &Arc<dyn GraphResolver> {
        &self.resolver
    }

    pub fn codec(&self) -> &Arc<ValueCodec> {
        &self.codec
    }

    pub fn cache(&self) -> &TwoTierCache {
        &self.cache
    }

    /// Storage for another entity type sharing every collaborator
    pub fn for_type(&self, entity_type: &str) -> StorageResult<EntityStorage> {
        self.codec.registry().build(entity_type)?;
        Ok(Self {
            entity_type: entity_type.to_string(),
            ..self.clone()
        })
    }

    /// New record of this type in the engine's default language
    pub fn create(&self, bundle: &str) -> Record {
        Record::new(self.entity_type.as_str(), bundle).with_langcode(self.config.default_langcode.as_str())
    }

    /// Entity query bound to this storage's connection and graphs
    pub fn query(&self) -> EntityQuery {
        EntityQuery::new(
            self.entity_type.clone(),
            Arc::clone(&self.connection),
            Arc::clone(&self.resolver),
            Arc::clone(&self.codec),
        )
    }

    /// Fail with `InvalidGraph` naming the first unknown id
    fn validate_graph_ids(&self, graph_ids: &[String]) -> StorageResult<()> {
        let known = self.resolver.entity_type_graph_ids(&self.entity_type)?;
        match graph_ids.iter().find(|id| !known.contains(id)) {
            Some(unknown) => Err(StorageError::InvalidGraph {
                graph_id: unknown.clone(),
                entity_type: self.entity_type.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Given candidates after validation, the type's defaults otherwise
    fn candidate_graphs(&self, graph_ids: Option<&[String]>) -> StorageResult<Vec<String>> {
        match graph_ids {
            Some(ids) if !ids.is_empty() => {
                self.validate_graph_ids(ids)?;
                Ok(ids.to_vec())
            }
            _ => Ok(self.resolver.default_graph_ids(&self.entity_type)?),
        }
    }

    fn check_record(&self, record: &Record) -> StorageResult<()> {
        if record.entity_type() != self.entity_type {
            return Err(StorageError::WrongEntityType {
                expected: self.entity_type.clone(),
                found: record.entity_type().to_string(),
            });
        }
        Ok(())
    }
}

/// Assembles an [`EntityStorage`]; collaborators left unset come from the config
pub struct StorageBuilder {
    config: Arc<EngineConfig>,
    connection: Option<Arc<dyn Connection>>,
    resolver: Option<Arc<dyn GraphResolver>>,
    codec: Option<Arc<ValueCodec>>,
    cache: Option<Arc<TwoTierCache>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    bundle_resolver: Option<Arc<dyn BundleResolver>>,
    graph_alters: Vec<Arc<dyn GraphAlter>>,
}

impl StorageBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            connection: None,
            resolver: None,
            codec: None,
            cache: None,
            id_generator: None,
            bundle_resolver: None,
            graph_alters: Vec::new(),
        }
    }

    pub fn connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn GraphResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn codec(mut self, codec: Arc<ValueCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn cache(mut self, cache: Arc<TwoTierCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    pub fn bundle_resolver(mut self, resolver: Arc<dyn BundleResolver>) -> Self {
        self.bundle_resolver = Some(resolver);
        self
    }

    pub fn graph_alter(mut self, alter: Arc<dyn GraphAlter>) -> Self {
        self.graph_alters.push(alter);
        self
    }

    pub fn build(self, entity_type: &str) -> StorageResult<EntityStorage> {
        let connection: Arc<dyn Connection> = match self.connection {
            Some(connection) => connection,
            None => Arc::new(HttpConnection::new(&self.config.connection)?),
        };
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(ConfigGraphResolver::new(Arc::clone(&self.config))));
        let codec = self.codec.unwrap_or_else(|| {
            let registry = Arc::new(FieldMappingRegistry::new(Arc::clone(&self.config)));
            Arc::new(ValueCodec::new(registry))
        });
        let cache = match self.cache {
            Some(cache) => cache,
            None => Arc::new(TwoTierCache::from_config(&self.config.cache)?),
        };

        codec.registry().build(entity_type)?;
        info!("Entity storage ready for '{}'", entity_type);

        Ok(EntityStorage {
            entity_type: entity_type.to_string(),
            config: self.config,
            connection,
            resolver,
            codec,
            cache,
            id_generator: self.id_generator.unwrap_or_else(|| Arc::new(UuidIdGenerator)),
            bundle_resolver: self.bundle_resolver,
            graph_alters: self.graph_alters,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_build_rejects_unknown_type() {
        let config = EngineConfig::from_yaml_str(CONFIG).unwrap();
        let result = EntityStorage::builder(config)
            .connection(Arc::new(crate::sparql::MemoryConnection::new().unwrap()))
            .build("node");
        assert!(matches!(result, Err(StorageError::Mapping(MappingError::UnknownEntityType(_)))));
    }

    #[test]
    fn test_invalid_graph_message() {
        let storage = storage();
        let err = storage
            .load("http://example.com/apple", Some(&["draft".to_string(), "nope".to_string()]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Graph 'nope' doesn't exist for entity type 'rdf_entity'.");
    }

    #[test]
    fn test_create_uses_default_langcode() {
        let config = EngineConfig::from_yaml_str(&CONFIG.replacen("graphs:", "default_langcode: fr\ngraphs:", 1)).unwrap();
        let storage = EntityStorage::builder(config)
            .connection(Arc::new(crate::sparql::MemoryConnection::new().unwrap()))
            .build("rdf_entity")
            .unwrap();
        let record = storage.create("fruit");
        assert_eq!(record.langcode(), Some("fr"));
        assert_eq!(record.entity_type(), "rdf_entity");
        assert!(record.is_new());
    }

    #[test]
    fn test_wrong_entity_type() {
        let storage = storage();
        let mut record = Record::new("taxonomy_term", "fruit");
        assert!(matches!(
            storage.save(&mut record),
            Err(StorageError::WrongEntityType { .. })
        ));
    }
}
