//! Raw triple capture and graph priority merge
//!
//! A [`RawRecord`] holds the triples of one subject as found in one graph,
//! before any field mapping happens. A [`RawRepository`] collects them in
//! arrival order. Repositories are never mutated after they are built: the
//! filter and merge operations return new repositories sharing the records.

use super::record::LANGCODE_DEFAULT;
use crate::rdf::{RdfTerm, Triple};
use crate::sparql::QuerySolution;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Predicate → language → values
pub type RawValues = IndexMap<String, IndexMap<String, Vec<String>>>;

/// One subject's triples from one graph
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    subject: String,
    graph: String,
    values: RawValues,
}

impl RawRecord {
    pub fn new(subject: impl Into<String>, graph: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            graph: graph.into(),
            values: IndexMap::new(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn values(&self) -> &RawValues {
        &self.values
    }

    /// Values of a predicate in one language
    pub fn get(&self, predicate: &str, langcode: &str) -> Option<&[String]> {
        self.values
            .get(predicate)
            .and_then(|langs| langs.get(langcode))
            .map(|v| v.as_slice())
    }

    /// Values of a predicate across all languages
    pub fn all(&self, predicate: &str) -> impl Iterator<Item = &str> {
        self.values
            .get(predicate)
            .into_iter()
            .flat_map(|langs| langs.values())
            .flat_map(|v| v.iter().map(|s| s.as_str()))
    }

    /// Append a value; untagged terms go under `x-default`
    pub fn push(&mut self, predicate: &str, term: &RdfTerm) {
        let langcode = term.language().unwrap_or(LANGCODE_DEFAULT);
        self.values
            .entry(predicate.to_string())
            .or_default()
            .entry(langcode.to_string())
            .or_default()
            .push(term.value().to_string());
    }
}

/// Ordered set of raw records, indexed by (graph, subject)
#[derive(Debug, Clone, Default)]
pub struct RawRepository {
    records: Vec<Arc<RawRecord>>,
    by_key: HashMap<(String, String), usize>,
    subjects: HashSet<String>,
}

impl RawRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from bulk-fetch rows binding `graph`, `entity_id`, `predicate`
    /// and `field_value`. Rows missing any of them are skipped.
    pub fn from_solutions(solutions: &[QuerySolution]) -> Self {
        let mut repo = Self::new();
        for row in solutions {
            if let (Some(graph), Some(subject), Some(predicate), Some(value)) = (
                row.get("graph"),
                row.get("entity_id"),
                row.get("predicate"),
                row.get("field_value"),
            ) {
                repo.ingest(graph.value(), subject.value(), predicate.value(), value);
            }
        }
        repo
    }

    /// Build from the triples of a single graph (CONSTRUCT output)
    pub fn from_triples(graph: &str, triples: &[Triple]) -> Self {
        let mut repo = Self::new();
        for triple in triples {
            repo.ingest(graph, triple.subject.as_str(), triple.predicate.as_str(), &triple.object);
        }
        repo
    }

    /// Find-or-create the record for (graph, subject) and append the value
    pub fn ingest(&mut self, graph: &str, subject: &str, predicate: &str, value: &RdfTerm) {
        let key = (graph.to_string(), subject.to_string());
        let idx = match self.by_key.get(&key) {
            Some(idx) => *idx,
            None => {
                self.records.push(Arc::new(RawRecord::new(subject, graph)));
                self.subjects.insert(subject.to_string());
                self.by_key.insert(key, self.records.len() - 1);
                self.records.len() - 1
            }
        };
        Arc::make_mut(&mut self.records[idx]).push(predicate, value);
    }

    fn push_shared(&mut self, record: Arc<RawRecord>) {
        let key = (record.graph.clone(), record.subject.clone());
        if self.by_key.contains_key(&key) {
            return;
        }
        self.subjects.insert(record.subject.clone());
        self.by_key.insert(key, self.records.len());
        self.records.push(record);
    }

    /// Records whose graph is one of `uris`, in the original order
    pub fn filter_by_graph_uris<S: AsRef<str>>(&self, uris: &[S]) -> RawRepository {
        let wanted: HashSet<&str> = uris.iter().map(|u| u.as_ref()).collect();
        let mut out = RawRepository::new();
        for record in &self.records {
            if wanted.contains(record.graph.as_str()) {
                out.push_shared(Arc::clone(record));
            }
        }
        out
    }

    /// All of `self` plus the records of `other` whose subject is not in `self`
    ///
    /// First writer wins per subject, whatever graph the other copy came from.
    pub fn merge(&self, other: &RawRepository) -> RawRepository {
        let mut out = self.clone();
        for record in &other.records {
            if !self.subjects.contains(&record.subject) {
                out.push_shared(Arc::clone(record));
            }
        }
        out
    }

    /// Fold one filtered repository per priority level, highest first
    pub fn prioritize<S: AsRef<str>>(&self, levels: &[Vec<S>]) -> RawRepository {
        levels.iter().fold(RawRepository::new(), |acc, uris| {
            acc.merge(&self.filter_by_graph_uris(uris))
        })
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.subjects.contains(subject)
    }

    /// First record for a subject
    pub fn get(&self, subject: &str) -> Option<&RawRecord> {
        self.records
            .iter()
            .find(|r| r.subject == subject)
            .map(|r| r.as_ref())
    }

    pub fn get_in_graph(&self, subject: &str, graph: &str) -> Option<&RawRecord> {
        self.by_key
            .get(&(graph.to_string(), subject.to_string()))
            .map(|idx| self.records[*idx].as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawRecord> {
        self.records.iter().map(|r| r.as_ref())
    }

    /// Distinct subjects in first-seen order
    pub fn subjects(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.subject.as_str()))
            .map(|r| r.subject.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
