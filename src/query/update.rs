//! Statement builders for load, save and delete
//!
//! Each function returns query text ready for the [`Connection`]. Graph
//! scoping follows the connection's dialect: Virtuoso takes the graph in
//! `INSERT DATA INTO <g>`/`DELETE FROM <g>`, SPARQL 1.1 stores need `GRAPH`
//! blocks.
//!
//! [`Connection`]: crate::sparql::Connection

use crate::rdf::{RdfResult, TripleGraph};
use crate::sparql::{SparqlArg, SparqlDialect};

/// Insert every triple of `graph` into the named graph `graph_uri`
pub fn insert_data(dialect: SparqlDialect, graph_uri: &str, triples: &TripleGraph) -> RdfResult<String> {
    let graph = SparqlArg::uri(graph_uri)?;
    let body = triples.to_ntriples()?;
    Ok(match dialect {
        SparqlDialect::Virtuoso => format!("INSERT DATA INTO {} {{\n{}}}", graph, body),
        SparqlDialect::Sparql11 => format!("INSERT DATA {{\n  GRAPH {} {{\n{}  }}\n}}", graph, body),
    })
}

/// Remove the `predicates` of `subject` from one graph, leaving other
/// predicates on the same subject alone
pub fn delete_predicates(
    dialect: SparqlDialect,
    graph_uri: &str,
    subject: &str,
    predicates: &[String],
) -> RdfResult<String> {
    let filter = format!(
        "FILTER (?entity IN ({})) FILTER (?field IN ({}))",
        SparqlArg::uri(subject)?,
        SparqlArg::uris(predicates, ", ")?
    );
    delete_where(dialect, graph_uri, &filter)
}

/// Remove every triple of the given subjects from one graph
pub fn delete_subjects<S: AsRef<str>>(dialect: SparqlDialect, graph_uri: &str, subjects: &[S]) -> RdfResult<String> {
    let filter = format!("FILTER (?entity IN ({}))", SparqlArg::uris(subjects, ", ")?);
    delete_where(dialect, graph_uri, &filter)
}

fn delete_where(dialect: SparqlDialect, graph_uri: &str, filter: &str) -> RdfResult<String> {
    let graph = SparqlArg::uri(graph_uri)?;
    let pattern = "?entity ?field ?value .";
    Ok(match dialect {
        SparqlDialect::Virtuoso => format!(
            "DELETE FROM {graph} {{\n  {pattern}\n}}\nWHERE {{\n  GRAPH {graph} {{\n    {pattern}\n    {filter}\n  }}\n}}"
        ),
        SparqlDialect::Sparql11 => format!(
            "DELETE {{\n  GRAPH {graph} {{ {pattern} }}\n}}\nWHERE {{\n  GRAPH {graph} {{\n    {pattern}\n    {filter}\n  }}\n}}"
        ),
    })
}

/// ASK whether `id` carries one of the bundle predicates
///
/// With `graph_uri` the check is limited to that graph, otherwise to the
/// named graphs in `graph_uris` (all named graphs when empty).
pub fn ask_exists(
    id: &str,
    bundle_predicates: &[String],
    graph_uri: Option<&str>,
    graph_uris: &[String],
) -> RdfResult<String> {
    let pattern = format!(
        "{} ?type ?o .\n    VALUES ?type {{ {} }}",
        SparqlArg::uri(id)?,
        SparqlArg::uris(bundle_predicates, " ")?
    );
    Ok(match graph_uri {
        Some(graph) => format!("ASK WHERE {{\n  GRAPH {} {{\n    {}\n  }}\n}}", SparqlArg::uri(graph)?, pattern),
        None => format!(
            "ASK\n{}WHERE {{\n  GRAPH ?g {{\n    {}\n  }}\n}}",
            from_named(graph_uris)?,
            pattern
        ),
    })
}

/// Every triple of every id, tagged with the graph it came from
pub fn bulk_fetch<S: AsRef<str>>(ids: &[S], graph_uris: &[String]) -> RdfResult<String> {
    Ok(format!(
        "SELECT ?graph ?entity_id ?predicate ?field_value\n{}WHERE {{\n  GRAPH ?graph {{\n    ?entity_id ?predicate ?field_value .\n    VALUES ?entity_id {{ {} }}\n  }}\n}}",
        from_named(graph_uris)?,
        SparqlArg::uris(ids, " ")?
    ))
}

/// Triples of one subject in one graph
pub fn construct_subject(graph_uri: &str, id: &str) -> RdfResult<String> {
    let subject = SparqlArg::uri(id)?;
    Ok(format!(
        "CONSTRUCT {{ {subject} ?p ?o }}\nWHERE {{\n  GRAPH {} {{ {subject} ?p ?o }}\n}}",
        SparqlArg::uri(graph_uri)?
    ))
}

fn from_named(graph_uris: &[String]) -> RdfResult<String> {
    graph_uris
        .iter()
        .map(|uri| Ok(format!("FROM NAMED {}\n", SparqlArg::uri(uri)?)))
        .collect()
}
