//! Ordered in-memory triple set
//!
//! Collects the triples produced while saving one record. Insertion order is
//! preserved so the generated update text is stable, and duplicates are
//! dropped on insert.

use super::serialization::{self, RdfFormat};
use super::types::{NamedNode, RdfResult, RdfSubject, RdfTerm, Triple};
use indexmap::IndexSet;

#[derive(Debug, Clone, Default)]
pub struct TripleGraph {
    triples: IndexSet<Triple>,
}

impl TripleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed N-Triples document
    pub fn from_ntriples(input: &str) -> RdfResult<Self> {
        Ok(serialization::parse(RdfFormat::NTriples, input)?
            .into_iter()
            .collect())
    }

    /// Add a triple, returns false if it was already present
    pub fn add(&mut self, subject: RdfSubject, predicate: NamedNode, object: RdfTerm) -> bool {
        self.triples.insert(Triple::new(subject, predicate, object))
    }

    /// Remove every triple with this predicate, returns how many were removed
    pub fn remove_predicate(&mut self, predicate: &str) -> usize {
        let before = self.triples.len();
        self.triples.retain(|t| t.predicate.as_str() != predicate);
        before - self.triples.len()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Objects of every triple with the given predicate
    pub fn objects<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a RdfTerm> + 'a {
        self.triples
            .iter()
            .filter(move |t| t.predicate.as_str() == predicate)
            .map(|t| &t.object)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// N-Triples body, one triple per line
    pub fn to_ntriples(&self) -> RdfResult<String> {
        let triples: Vec<Triple> = self.triples.iter().cloned().collect();
        serialization::serialize(RdfFormat::NTriples, &triples)
    }

    pub fn to_turtle(&self) -> RdfResult<String> {
        let triples: Vec<Triple> = self.triples.iter().cloned().collect();
        serialization::serialize(RdfFormat::Turtle, &triples)
    }
}

impl FromIterator<Triple> for TripleGraph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}
