//! Embedded store connection
//!
//! Runs the generated query text against an in-memory oxigraph store. Speaks
//! the SPARQL 1.1 update dialect. Used by the demo binary and the tests.

use super::connection::{Connection, ConnectionError, ConnectionResult, SparqlDialect};
use super::results::{QueryResults, QuerySolution};
use crate::rdf::{BlankNode, Literal, NamedNode, RdfError, RdfResult, RdfTerm, Triple, XSD_STRING};
use oxigraph::model::Term;
use oxigraph::sparql::{QueryResults as OxQueryResults, SparqlEvaluator};
use oxigraph::store::Store;
use tracing::{debug, info};

pub struct MemoryConnection {
    store: Store,
}

impl MemoryConnection {
    pub fn new() -> ConnectionResult<Self> {
        let store = Store::new().map_err(|e| ConnectionError::Setup(e.to_string()))?;
        info!("Opened in-memory SPARQL store");
        Ok(Self { store })
    }

    /// Number of quads across all graphs
    pub fn len(&self) -> usize {
        self.store.len().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Connection for MemoryConnection {
    fn query(&self, query: &str) -> ConnectionResult<QueryResults> {
        debug!("SPARQL query:\n{}", query);

        let results = SparqlEvaluator::new()
            .parse_query(query)
            .map_err(|e| ConnectionError::query(query, e))?
            .on_store(&self.store)
            .execute()
            .map_err(|e| ConnectionError::query(query, e))?;

        match results {
            OxQueryResults::Solutions(solutions) => {
                let variables = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| ConnectionError::query(query, e))?;
                    let mut row = QuerySolution::new();
                    for (variable, term) in solution.iter() {
                        let term = convert_term(term.clone())
                            .map_err(|e| ConnectionError::query(query, e))?;
                        row.bind(variable.as_str(), term);
                    }
                    rows.push(row);
                }
                Ok(QueryResults::Solutions {
                    variables,
                    solutions: rows,
                })
            }
            OxQueryResults::Boolean(value) => Ok(QueryResults::Boolean(value)),
            OxQueryResults::Graph(triples) => {
                let mut out = Vec::new();
                for triple in triples {
                    let triple = triple.map_err(|e| ConnectionError::query(query, e))?;
                    let subject = convert_term(Term::from(triple.subject))
                        .map_err(|e| ConnectionError::query(query, e))?
                        .into_subject()
                        .ok_or_else(|| ConnectionError::query(query, "literal in subject position"))?;
                    let predicate = NamedNode::new(triple.predicate.as_str())
                        .map_err(|e| ConnectionError::query(query, e))?;
                    let object = convert_term(triple.object)
                        .map_err(|e| ConnectionError::query(query, e))?;
                    out.push(Triple::new(subject, predicate, object));
                }
                Ok(QueryResults::Graph(out))
            }
            #[allow(unreachable_patterns)]
            _ => Err(ConnectionError::UnexpectedResult {
                expected: "solutions, boolean or graph",
            }),
        }
    }

    fn update(&self, update: &str) -> ConnectionResult<()> {
        debug!("SPARQL update:\n{}", update);

        SparqlEvaluator::new()
            .parse_update(update)
            .map_err(|e| ConnectionError::update(update, e))?
            .on_store(&self.store)
            .execute()
            .map_err(|e| ConnectionError::update(update, e))
    }

    fn dialect(&self) -> SparqlDialect {
        SparqlDialect::Sparql11
    }
}

fn convert_term(term: Term) -> RdfResult<RdfTerm> {
    match term {
        Term::NamedNode(n) => Ok(NamedNode::new(n.into_string())?.into()),
        Term::BlankNode(b) => Ok(BlankNode::from_id(b.into_string())?.into()),
        Term::Literal(l) => match l.language() {
            Some(language) => Ok(Literal::new_language_tagged_literal(l.value(), language)?.into()),
            None if l.datatype().as_str() == XSD_STRING => {
                Ok(Literal::new_simple_literal(l.value()).into())
            }
            None => Ok(Literal::new_typed_literal(
                l.value(),
                NamedNode::new(l.datatype().as_str())?,
            )
            .into()),
        },
        #[allow(unreachable_patterns)]
        _ => Err(RdfError::Parse("Unsupported term in results".to_string())),
    }
}
