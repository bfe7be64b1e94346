//! Storage behaviour against a scripted connection speaking the Virtuoso dialect

use rdf_entity::rdf::{Literal, NamedNode, RdfTerm};
use rdf_entity::{
    Connection, ConnectionError, EngineConfig, EntityStorage, QueryResults, QuerySolution, Record,
    SparqlDialect, StorageError, TwoTierCache,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const CONFIG: &str = r#"
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
          default: http://example.com/graph/published
          draft: http://example.com/graph/draft
        base_fields_mapping:
          label:
            value:
              predicate: http://example.com/label
      vegetable:
        rdf_type: http://example.com/vegetable
        graphs:
          default: http://example.com/veg/published
          draft: http://example.com/veg/draft
        base_fields_mapping:
          label:
            value:
              predicate: http://example.com/label
"#;

/// Answers queries from a script and records every statement it receives
#[derive(Default)]
struct ScriptedConnection {
    answers: Mutex<VecDeque<Result<QueryResults, ConnectionError>>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedConnection {
    fn answer(&self, result: Result<QueryResults, ConnectionError>) {
        self.answers.lock().unwrap().push_back(result);
    }

    fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Connection for ScriptedConnection {
    fn query(&self, query: &str) -> Result<QueryResults, ConnectionError> {
        self.log.lock().unwrap().push(query.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResults::empty()))
    }

    fn update(&self, update: &str) -> Result<(), ConnectionError> {
        self.log.lock().unwrap().push(update.to_string());
        Ok(())
    }

    fn dialect(&self) -> SparqlDialect {
        SparqlDialect::Virtuoso
    }
}

fn setup() -> (Arc<ScriptedConnection>, EntityStorage) {
    setup_with(CONFIG)
}

fn setup_with(yaml: &str) -> (Arc<ScriptedConnection>, EntityStorage) {
    let connection = Arc::new(ScriptedConnection::default());
    let storage = EntityStorage::builder(EngineConfig::from_yaml_str(yaml).unwrap())
        .connection(connection.clone())
        .cache(Arc::new(TwoTierCache::disabled()))
        .build("rdf_entity")
        .unwrap();
    (connection, storage)
}

fn row(graph: &str, predicate: &str, value: RdfTerm) -> QuerySolution {
    row_for("http://ex/apple", graph, predicate, value)
}

fn row_for(subject: &str, graph: &str, predicate: &str, value: RdfTerm) -> QuerySolution {
    let mut solution = QuerySolution::new();
    solution.bind("graph", NamedNode::new(graph).unwrap().into());
    solution.bind("entity_id", NamedNode::new(subject).unwrap().into());
    solution.bind("predicate", NamedNode::new(predicate).unwrap().into());
    solution.bind("field_value", value);
    solution
}

fn solutions(rows: Vec<QuerySolution>) -> QueryResults {
    QueryResults::Solutions {
        variables: vec![
            "graph".to_string(),
            "entity_id".to_string(),
            "predicate".to_string(),
            "field_value".to_string(),
        ],
        solutions: rows,
    }
}

#[test]
fn test_create_asks_then_inserts() {
    let (connection, storage) = setup();
    connection.answer(Ok(QueryResults::Boolean(false)));

    let mut record = Record::new("rdf_entity", "fruit")
        .with_id("http://ex/apple")
        .with_graph("draft");
    record.set_value("label", "Apple");
    storage.save(&mut record).unwrap();

    let statements = connection.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("ASK"));
    assert!(statements[0].contains("FROM NAMED <http://example.com/graph/draft>"));
    assert!(statements[1].starts_with("INSERT DATA INTO <http://example.com/graph/draft> {"));
    assert!(statements[1].contains("<http://ex/apple> <http://example.com/label> \"Apple\" ."));
    assert!(statements[1].contains(
        "<http://ex/apple> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.com/fruit> ."
    ));
}

#[test]
fn test_update_deletes_before_insert() {
    let (connection, storage) = setup();
    let mut record = Record::new("rdf_entity", "fruit")
        .with_id("http://ex/apple")
        .with_graph("default");
    record.enforce_is_new(false);
    record.set_value("label", "Apple");
    storage.save(&mut record).unwrap();

    let statements = connection.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("DELETE FROM <http://example.com/graph/published>"));
    assert!(statements[0].contains("FILTER (?entity IN (<http://ex/apple>))"));
    assert!(statements[0].contains("<http://example.com/label>"));
    assert!(statements[1].starts_with("INSERT DATA INTO <http://example.com/graph/published>"));
}

#[test]
fn test_query_failure_keeps_query_text() {
    let (connection, storage) = setup();
    connection.answer(Err(ConnectionError::Query {
        query: "SELECT broken".to_string(),
        message: "timeout".to_string(),
    }));

    let err = storage.load("http://ex/apple", None).unwrap_err();
    match err {
        StorageError::Connection(ConnectionError::Query { query, message }) => {
            assert_eq!(query, "SELECT broken");
            assert_eq!(message, "timeout");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        StorageError::Connection(ConnectionError::Query {
            query: "SELECT broken".to_string(),
            message: "timeout".to_string(),
        })
        .to_string(),
        "Execution of query failed: SELECT broken"
    );
}

#[test]
fn test_load_prefers_first_candidate() {
    let (connection, storage) = setup();
    let fruit: RdfTerm = NamedNode::new("http://example.com/fruit").unwrap().into();
    let published = "http://example.com/graph/published";
    let draft = "http://example.com/graph/draft";
    let rdf_type = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    let label = "http://example.com/label";

    let rows = vec![
        row(published, rdf_type, fruit.clone()),
        row(published, label, Literal::new_simple_literal("Apple").into()),
        row(draft, rdf_type, fruit),
        row(draft, label, Literal::new_simple_literal("Apple (draft)").into()),
    ];
    connection.answer(Ok(solutions(rows.clone())));
    connection.answer(Ok(solutions(rows)));

    let candidates = vec!["draft".to_string(), "default".to_string()];
    let record = storage.load("http://ex/apple", Some(&candidates)).unwrap().unwrap();
    assert_eq!(record.graph(), Some("draft"));
    assert_eq!(record.value("label").and_then(|v| v.as_string()), Some("Apple (draft)"));

    let record = storage.load("http://ex/apple", None).unwrap().unwrap();
    assert_eq!(record.graph(), Some("default"));
    assert_eq!(record.value("label").and_then(|v| v.as_string()), Some("Apple"));

    let fetch = &connection.statements()[0];
    assert!(fetch.contains("FROM NAMED <http://example.com/graph/published>"));
    assert!(fetch.contains("FROM NAMED <http://example.com/graph/draft>"));
    assert!(fetch.contains("VALUES ?entity_id { <http://ex/apple> }"));
}

#[test]
fn test_unmapped_type_is_reported_per_id() {
    let (connection, storage) = setup();
    let rdf_type = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    connection.answer(Ok(solutions(vec![row(
        "http://example.com/graph/published",
        rdf_type,
        NamedNode::new("http://example.com/mineral").unwrap().into(),
    )])));

    let outcome = storage.load_multiple(&["http://ex/apple"], None).unwrap();
    assert!(outcome.records.is_empty());
    assert!(matches!(
        outcome.errors.get("http://ex/apple"),
        Some(StorageError::BundleNotFound { .. })
    ));
}

#[test]
fn test_copy_outside_bundle_graphs_yields_to_next_candidate() {
    let (connection, storage) = setup();
    let fruit: RdfTerm = NamedNode::new("http://example.com/fruit").unwrap().into();
    let rdf_type = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    let label = "http://example.com/label";
    let stray = "http://example.com/veg/draft";
    let published = "http://example.com/graph/published";

    connection.answer(Ok(solutions(vec![
        row(stray, rdf_type, fruit.clone()),
        row(stray, label, Literal::new_simple_literal("Stray apple").into()),
        row(published, rdf_type, fruit),
        row(published, label, Literal::new_simple_literal("Apple").into()),
    ])));

    let candidates = vec!["draft".to_string(), "default".to_string()];
    let record = storage.load("http://ex/apple", Some(&candidates)).unwrap().unwrap();
    assert_eq!(record.graph(), Some("default"));
    assert_eq!(record.value("label").and_then(|v| v.as_string()), Some("Apple"));
}

fn small_batches() -> String {
    format!("batch_size: 2\n{}", CONFIG)
}

#[test]
fn test_failing_chunk_aborts_load() {
    let (connection, storage) = setup_with(&small_batches());
    let fruit: RdfTerm = NamedNode::new("http://example.com/fruit").unwrap().into();
    let rdf_type = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    let published = "http://example.com/graph/published";
    connection.answer(Ok(solutions(vec![
        row_for("http://ex/a", published, rdf_type, fruit.clone()),
        row_for("http://ex/b", published, rdf_type, fruit),
    ])));
    connection.answer(Err(ConnectionError::Query {
        query: "SELECT chunk 2".to_string(),
        message: "timeout".to_string(),
    }));

    let ids = ["http://ex/a", "http://ex/b", "http://ex/c"];
    let err = storage.load_multiple(&ids, None).unwrap_err();
    assert!(matches!(err, StorageError::Connection(ConnectionError::Query { .. })));

    let statements = connection.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].contains("<http://ex/a>") && statements[0].contains("<http://ex/b>"));
    assert!(!statements[0].contains("<http://ex/c>"));
    assert!(statements[1].contains("<http://ex/c>"));
}

#[test]
fn test_delete_is_chunked_per_graph() {
    let (connection, storage) = setup_with(&small_batches());
    let records: Vec<Record> = (0..5)
        .map(|i| Record::new("rdf_entity", "fruit").with_id(format!("http://ex/f{}", i)))
        .collect();
    storage.delete(&records).unwrap();

    let statements = connection.statements();
    // two graphs, three batches each
    assert_eq!(statements.len(), 6);
    assert!(statements.iter().all(|s| s.starts_with("DELETE FROM <")));
    assert_eq!(
        statements
            .iter()
            .filter(|s| s.starts_with("DELETE FROM <http://example.com/graph/draft>"))
            .count(),
        3
    );
    assert!(statements[2].contains("FILTER (?entity IN (<http://ex/f4>))"));
}
