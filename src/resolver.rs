//! Graph resolution
//!
//! Maps graph ids ("default", "draft", …) to the graph URIs each bundle stores
//! its triples in, and decides which graphs a load looks at when the caller
//! gives no candidates.

use crate::config::{EngineConfig, DEFAULT_GRAPH};
use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;

/// Graph resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Bundle '{bundle}' does not exist for entity type '{entity_type}'")]
    UnknownBundle { entity_type: String, bundle: String },

    #[error("Bundle '{bundle}' of '{entity_type}' has no URI for graph '{graph_id}'")]
    NoGraphUri {
        entity_type: String,
        bundle: String,
        graph_id: String,
    },

    #[error("Entity type '{0}' has no enabled graph")]
    NoDefaultGraph(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Bundle → graph id → graph URI
pub type GraphUriMap = IndexMap<String, IndexMap<String, String>>;

/// Read side of the graph configuration
pub trait GraphResolver: Send + Sync {
    /// Enabled graph ids for the type, highest priority first
    fn default_graph_ids(&self, entity_type: &str) -> GraphResult<Vec<String>>;

    /// Graph URIs of every bundle
    fn graph_uris(&self, entity_type: &str) -> GraphResult<GraphUriMap>;

    fn bundle_graph_uri(&self, entity_type: &str, bundle: &str, graph_id: &str) -> GraphResult<String>;

    /// Every graph id registered for the type, disabled ones included
    fn entity_type_graph_ids(&self, entity_type: &str) -> GraphResult<Vec<String>>;

    /// Graph id a bundle stores under `uri`
    fn bundle_graph_id(&self, entity_type: &str, bundle: &str, uri: &str) -> GraphResult<Option<String>> {
        let uris = self.graph_uris(entity_type)?;
        let graphs = uris.get(bundle).ok_or_else(|| GraphError::UnknownBundle {
            entity_type: entity_type.to_string(),
            bundle: bundle.to_string(),
        })?;
        Ok(graphs
            .iter()
            .find(|(_, graph_uri)| graph_uri.as_str() == uri)
            .map(|(graph_id, _)| graph_id.clone()))
    }

    /// All URIs of the given graphs across bundles; every graph when `None`
    fn graph_uris_flat(&self, entity_type: &str, graph_ids: Option<&[String]>) -> GraphResult<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        for graphs in self.graph_uris(entity_type)?.values() {
            for (graph_id, uri) in graphs {
                if graph_ids.map_or(true, |ids| ids.contains(graph_id)) && !out.contains(uri) {
                    out.push(uri.clone());
                }
            }
        }
        Ok(out)
    }

    /// First default graph id
    fn default_graph_id(&self, entity_type: &str) -> GraphResult<String> {
        self.default_graph_ids(entity_type)?
            .into_iter()
            .next()
            .ok_or_else(|| GraphError::NoDefaultGraph(entity_type.to_string()))
    }
}

/// Alters the default graph list of an entity type
pub trait DefaultGraphsHook: Send + Sync {
    fn alter(&self, entity_type: &str, graph_ids: &mut Vec<String>);
}

/// Resolver backed by [`EngineConfig`]
pub struct ConfigGraphResolver {
    config: Arc<EngineConfig>,
    hooks: Vec<Arc<dyn DefaultGraphsHook>>,
}

impl ConfigGraphResolver {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn DefaultGraphsHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    fn check_type(&self, entity_type: &str) -> GraphResult<()> {
        if self.config.entity_types.contains_key(entity_type) {
            Ok(())
        } else {
            Err(GraphError::UnknownEntityType(entity_type.to_string()))
        }
    }

    /// Graphs applying to the type, by weight then declaration order
    fn sorted_graphs(&self, entity_type: &str, enabled_only: bool) -> Vec<String> {
        let mut graphs: Vec<_> = self
            .config
            .graphs
            .iter()
            .filter(|g| g.applies_to(entity_type))
            .filter(|g| !enabled_only || g.enabled)
            .collect();
        graphs.sort_by_key(|g| g.weight);
        graphs.into_iter().map(|g| g.id.clone()).collect()
    }
}

impl GraphResolver for ConfigGraphResolver {
    fn default_graph_ids(&self, entity_type: &str) -> GraphResult<Vec<String>> {
        self.check_type(entity_type)?;
        let mut ids = self.sorted_graphs(entity_type, true);
        for hook in &self.hooks {
            hook.alter(entity_type, &mut ids);
        }
        Ok(ids)
    }

    fn graph_uris(&self, entity_type: &str) -> GraphResult<GraphUriMap> {
        self.check_type(entity_type)?;
        let graph_ids = self.sorted_graphs(entity_type, false);
        let mut out = GraphUriMap::new();
        for (bundle_id, bundle) in &self.config.entity_types[entity_type].bundles {
            let graphs = graph_ids
                .iter()
                .filter_map(|id| bundle.graphs.get(id).map(|uri| (id.clone(), uri.clone())))
                .collect();
            out.insert(bundle_id.clone(), graphs);
        }
        Ok(out)
    }

    fn bundle_graph_uri(&self, entity_type: &str, bundle: &str, graph_id: &str) -> GraphResult<String> {
        let uris = self.graph_uris(entity_type)?;
        let graphs = uris.get(bundle).ok_or_else(|| GraphError::UnknownBundle {
            entity_type: entity_type.to_string(),
            bundle: bundle.to_string(),
        })?;
        graphs
            .get(graph_id)
            .cloned()
            .ok_or_else(|| GraphError::NoGraphUri {
                entity_type: entity_type.to_string(),
                bundle: bundle.to_string(),
                graph_id: graph_id.to_string(),
            })
    }

    fn entity_type_graph_ids(&self, entity_type: &str) -> GraphResult<Vec<String>> {
        self.check_type(entity_type)?;
        Ok(self.sorted_graphs(entity_type, false))
    }

    fn default_graph_id(&self, entity_type: &str) -> GraphResult<String> {
        let ids = self.default_graph_ids(entity_type)?;
        // "default" stays the fallback write target even when a hook reorders
        if ids.iter().any(|id| id == DEFAULT_GRAPH) {
            return Ok(DEFAULT_GRAPH.to_string());
        }
        ids.into_iter()
            .next()
            .ok_or_else(|| GraphError::NoDefaultGraph(entity_type.to_string()))
    }
}
