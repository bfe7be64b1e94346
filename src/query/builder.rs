//! Entity selection queries
//!
//! ```text
//! SELECT DISTINCT ?entity
//! FROM <graph-1>
//! FROM <graph-2>
//! WHERE {
//!   ?entity rdf:type ?bundle .
//!   VALUES ?bundle { <type-1> <type-2> }
//!   …conditions…
//! }
//! ORDER BY ASC(?entity)
//! LIMIT 10
//! OFFSET 0
//! ```
//!
//! Only one sort criterion is honoured: when several are added the last one
//! wins. Sorting is limited to `id` and the bundle key.

use super::condition::{CompileContext, ConditionGroup, Operator};
use crate::entity::FieldValue;
use crate::mapping::{CodecError, MappingError, ValueCodec};
use crate::rdf::RdfError;
use crate::resolver::{GraphError, GraphResolver};
use crate::sparql::{Connection, ConnectionError, SparqlArg};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Query construction and execution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryBuildError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("RDF error: {0}")]
    Rdf(RdfError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Codec error: {0}")]
    Codec(CodecError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Graph '{graph_id}' doesn't exist for entity type '{entity_type}'.")]
    UnknownGraph { graph_id: String, entity_type: String },

    #[error("Unsupported operator '{0}'")]
    UnsupportedOperator(String),

    #[error("Invalid condition on '{field}': {message}")]
    InvalidCondition { field: String, message: String },

    #[error("Sorting is only supported on 'id' and the bundle key, not '{0}'")]
    UnsupportedSort(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl From<RdfError> for QueryBuildError {
    fn from(err: RdfError) -> Self {
        match err {
            RdfError::InvalidIri(iri) => QueryBuildError::InvalidUri(iri),
            other => QueryBuildError::Rdf(other),
        }
    }
}

impl From<CodecError> for QueryBuildError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Rdf(rdf) => rdf.into(),
            CodecError::Mapping(mapping) => QueryBuildError::Mapping(mapping),
            other => QueryBuildError::Codec(other),
        }
    }
}

pub type QueryBuildResult<T> = Result<T, QueryBuildError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Entity query over the graphs of one entity type
pub struct EntityQuery {
    entity_type: String,
    connection: Arc<dyn Connection>,
    resolver: Arc<dyn GraphResolver>,
    codec: Arc<ValueCodec>,
    graph_ids: Option<Vec<String>>,
    condition: ConditionGroup,
    sorts: Vec<(String, SortDirection)>,
    range: Option<(usize, usize)>,
}

impl EntityQuery {
    pub fn new(
        entity_type: impl Into<String>,
        connection: Arc<dyn Connection>,
        resolver: Arc<dyn GraphResolver>,
        codec: Arc<ValueCodec>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            connection,
            resolver,
            codec,
            graph_ids: None,
            condition: ConditionGroup::and(),
            sorts: Vec::new(),
            range: None,
        }
    }

    /// Restrict to these graphs; the type's default graphs otherwise
    pub fn graphs(mut self, graph_ids: Vec<String>) -> Self {
        self.graph_ids = if graph_ids.is_empty() { None } else { Some(graph_ids) };
        self
    }

    pub fn condition(mut self, field: &str, value: impl Into<FieldValue>, operator: Operator) -> Self {
        self.condition.push(field, value.into(), operator, None);
        self
    }

    /// Nested AND/OR group
    pub fn condition_group(mut self, group: ConditionGroup) -> Self {
        self.condition = self.condition.group(group);
        self
    }

    pub fn exists(mut self, field: &str) -> Self {
        self.condition = self.condition.exists(field);
        self
    }

    pub fn not_exists(mut self, field: &str) -> Self {
        self.condition = self.condition.not_exists(field);
        self
    }

    /// Add a sort criterion. Only the last one added is applied.
    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sorts.push((field.to_string(), direction));
        self
    }

    pub fn range(mut self, start: usize, length: usize) -> Self {
        self.range = Some((start, length));
        self
    }

    /// SELECT text for the ids
    pub fn to_sparql(&self) -> QueryBuildResult<Option<String>> {
        self.build(false)
    }

    /// SELECT text for the count
    pub fn to_count_sparql(&self) -> QueryBuildResult<Option<String>> {
        self.build(true)
    }

    /// Matching ids, in result order
    pub fn execute(&self) -> QueryBuildResult<Vec<String>> {
        let Some(query) = self.to_sparql()? else {
            return Ok(Vec::new());
        };
        debug!("Entity query for '{}'", self.entity_type);
        let solutions = self
            .connection
            .query(&query)?
            .into_solutions()
            .ok_or(ConnectionError::UnexpectedResult { expected: "solutions" })?;

        let mut ids: Vec<String> = Vec::new();
        for solution in solutions {
            if let Some(entity) = solution.get("entity") {
                let id = entity.value().to_string();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Number of matching entities
    pub fn count(&self) -> QueryBuildResult<u64> {
        let Some(query) = self.to_count_sparql()? else {
            return Ok(0);
        };
        let solutions = self
            .connection
            .query(&query)?
            .into_solutions()
            .ok_or(ConnectionError::UnexpectedResult { expected: "solutions" })?;
        let Some(count) = solutions.first().and_then(|s| s.get("count")) else {
            return Ok(0);
        };
        count
            .value()
            .parse::<u64>()
            .map_err(|_| ConnectionError::UnexpectedResult { expected: "numeric count" }.into())
    }

    /// `None` when the selected graphs hold no URI for any bundle
    fn build(&self, count: bool) -> QueryBuildResult<Option<String>> {
        let mapping = self.codec.registry().build(&self.entity_type)?;

        let graph_ids = match &self.graph_ids {
            Some(ids) => {
                let known = self.resolver.entity_type_graph_ids(&self.entity_type)?;
                if let Some(unknown) = ids.iter().find(|id| !known.contains(id)) {
                    return Err(QueryBuildError::UnknownGraph {
                        graph_id: unknown.clone(),
                        entity_type: self.entity_type.clone(),
                    });
                }
                ids.clone()
            }
            None => self.resolver.default_graph_ids(&self.entity_type)?,
        };
        let graph_uris = self
            .resolver
            .graph_uris_flat(&self.entity_type, Some(&graph_ids))?;
        let bundle_types = mapping.bundles_to_uris(&[]);
        if graph_uris.is_empty() || bundle_types.is_empty() {
            return Ok(None);
        }

        let mut query = if count {
            "SELECT (COUNT(DISTINCT ?entity) AS ?count)\n".to_string()
        } else {
            "SELECT DISTINCT ?entity\n".to_string()
        };
        for uri in &graph_uris {
            query.push_str(&format!("FROM {}\n", SparqlArg::uri(uri)?));
        }

        let mut ctx = CompileContext::new(&self.entity_type, &mapping, &self.codec);
        query.push_str(&format!(
            "WHERE {{\n?entity {} ?bundle .\nVALUES ?bundle {{ {} }}\n",
            ctx.bundle_path()?,
            SparqlArg::uris(&bundle_types, " ")?
        ));
        let conditions = self.condition.compile(&mut ctx)?;
        if !conditions.is_empty() {
            query.push_str(&conditions);
            query.push('\n');
        }
        query.push_str("}\n");

        if count {
            return Ok(Some(query));
        }

        if let Some((field, direction)) = self.sorts.last() {
            let var = if field == "id" {
                "?entity"
            } else if field == mapping.bundle_key() {
                "?bundle"
            } else {
                return Err(QueryBuildError::UnsupportedSort(field.clone()));
            };
            query.push_str(&format!("ORDER BY {}({})\n", direction, var));
        }

        if let Some((start, length)) = self.range {
            query.push_str(&format!("LIMIT {}\nOFFSET {}\n", length, start));
        }

        Ok(Some(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::mapping::FieldMappingRegistry;
    use crate::resolver::ConfigGraphResolver;
    use crate::rdf::Literal;
    use crate::sparql::{MemoryConnection, QueryResults, QuerySolution, SparqlDialect};

    const YAML: &str = r#"
graphs:
  - id: default
  - id: draft
    weight: 10
entity_types:
  rdf_entity:
    base_fields:
      label: {}
    bundles:
      fruit:
        rdf_type: http://example.com/fruit
        graphs:
          default: http://example.com/fruit/published
          draft: http://example.com/fruit/draft
        base_fields_mapping:
          label:
            value:
              predicate: http://example.com/label
"#;

    fn query_on(connection: Arc<dyn Connection>) -> EntityQuery {
        let config = Arc::new(EngineConfig::from_yaml_str(YAML).unwrap());
        let codec = Arc::new(ValueCodec::new(Arc::new(FieldMappingRegistry::new(config.clone()))));
        EntityQuery::new(
            "rdf_entity",
            connection,
            Arc::new(ConfigGraphResolver::new(config)),
            codec,
        )
    }

    fn query() -> EntityQuery {
        query_on(Arc::new(MemoryConnection::new().unwrap()))
    }

    #[test]
    fn test_default_graphs_and_bundle_restriction() {
        let sparql = query().to_sparql().unwrap().unwrap();
        assert!(sparql.starts_with(
            "SELECT DISTINCT ?entity\nFROM <http://example.com/fruit/published>\nFROM <http://example.com/fruit/draft>\nWHERE {"
        ));
        assert!(sparql.contains("VALUES ?bundle { <http://example.com/fruit> }"));
    }

    #[test]
    fn test_last_sort_wins() {
        let sparql = query()
            .sort("rid", SortDirection::Asc)
            .sort("id", SortDirection::Desc)
            .range(20, 10)
            .to_sparql()
            .unwrap()
            .unwrap();
        assert!(sparql.contains("ORDER BY DESC(?entity)\nLIMIT 10\nOFFSET 20\n"));
        assert!(!sparql.contains("?bundle)"));
    }

    #[test]
    fn test_unsupported_sort() {
        let err = query().sort("label", SortDirection::Asc).to_sparql().unwrap_err();
        assert_eq!(err, QueryBuildError::UnsupportedSort("label".to_string()));
    }

    #[test]
    fn test_count_ignores_sort_and_range() {
        let sparql = query()
            .sort("id", SortDirection::Asc)
            .range(0, 5)
            .to_count_sparql()
            .unwrap()
            .unwrap();
        assert!(sparql.starts_with("SELECT (COUNT(DISTINCT ?entity) AS ?count)"));
        assert!(!sparql.contains("ORDER BY"));
        assert!(!sparql.contains("LIMIT"));
    }

    /// Store answering every query with one fixed solution
    struct FixedAnswer(QueryResults);

    impl Connection for FixedAnswer {
        fn query(&self, _query: &str) -> Result<QueryResults, ConnectionError> {
            Ok(self.0.clone())
        }

        fn update(&self, _update: &str) -> Result<(), ConnectionError> {
            Ok(())
        }

        fn dialect(&self) -> SparqlDialect {
            SparqlDialect::Sparql11
        }
    }

    #[test]
    fn test_count_rejects_non_numeric_answer() {
        let mut solution = QuerySolution::new();
        solution.bind("count", Literal::new_simple_literal("many").into());
        let answer = QueryResults::Solutions {
            variables: vec!["count".to_string()],
            solutions: vec![solution],
        };
        let err = query_on(Arc::new(FixedAnswer(answer))).count().unwrap_err();
        assert!(matches!(
            err,
            QueryBuildError::Connection(ConnectionError::UnexpectedResult { .. })
        ));
    }

    #[test]
    fn test_unknown_graph_rejected() {
        let err = query().graphs(vec!["archive".to_string()]).to_sparql().unwrap_err();
        assert_eq!(err.to_string(), "Graph 'archive' doesn't exist for entity type 'rdf_entity'.");
    }

    #[test]
    fn test_execute_against_memory_store() {
        let connection: Arc<dyn Connection> = Arc::new(MemoryConnection::new().unwrap());
        connection
            .update(
                "INSERT DATA { GRAPH <http://example.com/fruit/draft> {
                    <http://ex/apple> a <http://example.com/fruit> ;
                        <http://example.com/label> \"Apple\" .
                    <http://ex/pear> a <http://example.com/fruit> ;
                        <http://example.com/label> \"Pear\" .
                } }",
            )
            .unwrap();

        let apple = query_on(connection.clone()).condition("label", "Apple", Operator::Eq);
        assert_eq!(apple.execute().unwrap(), vec!["http://ex/apple".to_string()]);
        assert_eq!(apple.count().unwrap(), 1);

        let sorted = query_on(connection.clone()).sort("id", SortDirection::Desc);
        assert_eq!(sorted.execute().unwrap(), vec!["http://ex/pear", "http://ex/apple"]);

        let published = query_on(connection).graphs(vec!["default".to_string()]);
        assert_eq!(published.count().unwrap(), 0);
    }
}
