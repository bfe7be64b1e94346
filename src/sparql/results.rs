//! SPARQL query results

use crate::rdf::{BlankNode, Literal, NamedNode, RdfError, RdfResult, RdfTerm, Triple};
use serde::Deserialize;
use std::collections::HashMap;

/// Query solution (variable bindings)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySolution {
    /// Variable name → RDF term bindings
    pub bindings: HashMap<String, RdfTerm>,
}

impl QuerySolution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding
    pub fn get(&self, variable: &str) -> Option<&RdfTerm> {
        self.bindings.get(variable)
    }

    /// Add a binding
    pub fn bind(&mut self, variable: impl Into<String>, term: RdfTerm) {
        self.bindings.insert(variable.into(), term);
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Result of a query, by query form
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResults {
    /// Bindings from a SELECT query
    Solutions {
        variables: Vec<String>,
        solutions: Vec<QuerySolution>,
    },

    /// ASK
    Boolean(bool),

    /// CONSTRUCT/DESCRIBE
    Graph(Vec<Triple>),
}

impl QueryResults {
    /// Empty SELECT result
    pub fn empty() -> Self {
        QueryResults::Solutions {
            variables: Vec::new(),
            solutions: Vec::new(),
        }
    }

    /// Truth value of an ASK result. Anything else counts as false.
    pub fn is_true(&self) -> bool {
        matches!(self, QueryResults::Boolean(true))
    }

    /// Solutions of a SELECT result, `None` for the other forms
    pub fn into_solutions(self) -> Option<Vec<QuerySolution>> {
        match self {
            QueryResults::Solutions { solutions, .. } => Some(solutions),
            _ => None,
        }
    }

    /// Triples of a CONSTRUCT result, `None` for the other forms
    pub fn into_triples(self) -> Option<Vec<Triple>> {
        match self {
            QueryResults::Graph(triples) => Some(triples),
            _ => None,
        }
    }
}

// application/sparql-results+json

#[derive(Debug, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    head: JsonHead,
    results: Option<JsonBindings>,
    boolean: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JsonBindings {
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Debug, Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang")]
    lang: Option<String>,
    datatype: Option<String>,
}

impl JsonTerm {
    fn into_term(self) -> RdfResult<RdfTerm> {
        match self.kind.as_str() {
            "uri" => Ok(NamedNode::new(self.value)?.into()),
            "bnode" => Ok(BlankNode::from_id(self.value)?.into()),
            // "typed-literal" is what older Virtuoso releases emit
            "literal" | "typed-literal" => match (self.lang, self.datatype) {
                (Some(lang), _) => Ok(Literal::new_language_tagged_literal(self.value, lang)?.into()),
                (None, Some(datatype)) => {
                    Ok(Literal::new_typed_literal(self.value, NamedNode::new(datatype)?).into())
                }
                (None, None) => Ok(Literal::new_simple_literal(self.value).into()),
            },
            other => Err(RdfError::Parse(format!("Unknown term type in results: {}", other))),
        }
    }
}

/// Decode a SPARQL 1.1 JSON results document (SELECT or ASK)
pub fn parse_json_results(body: &str) -> RdfResult<QueryResults> {
    let doc: JsonDocument =
        serde_json::from_str(body).map_err(|e| RdfError::Parse(e.to_string()))?;

    if let Some(boolean) = doc.boolean {
        return Ok(QueryResults::Boolean(boolean));
    }

    let mut solutions = Vec::new();
    for row in doc.results.map(|r| r.bindings).unwrap_or_default() {
        let mut solution = QuerySolution::new();
        for (variable, term) in row {
            solution.bind(variable, term.into_term()?);
        }
        solutions.push(solution);
    }

    Ok(QueryResults::Solutions {
        variables: doc.head.vars,
        solutions,
    })
}
