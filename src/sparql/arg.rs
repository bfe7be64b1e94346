//! Query-safe rendering of URIs and literals
//!
//! Every identifier or value that ends up in generated query text goes through
//! `SparqlArg`. URIs are validated as absolute IRIs and emitted in `<…>` form;
//! literals use N-Triples escaping. Nothing is interpolated raw.

use crate::rdf::{Literal, NamedNode, RdfResult, RdfTerm};
use oxiri::Iri;

pub struct SparqlArg;

impl SparqlArg {
    /// `<uri>`, failing on anything that is not an absolute IRI
    pub fn uri(value: &str) -> RdfResult<String> {
        Ok(NamedNode::new(value)?.to_string())
    }

    /// Several URIs joined with `separator` (", " for IN lists, " " for VALUES)
    pub fn uris<I, S>(values: I, separator: &str) -> RdfResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rendered = values
            .into_iter()
            .map(|v| Self::uri(v.as_ref()))
            .collect::<RdfResult<Vec<_>>>()?;
        Ok(rendered.join(separator))
    }

    /// Escaped literal
    pub fn literal(value: &Literal) -> String {
        value.to_string()
    }

    /// Plain string literal
    pub fn string(value: &str) -> String {
        Literal::new_simple_literal(value).to_string()
    }

    /// Any term in query syntax
    pub fn term(term: &RdfTerm) -> String {
        term.to_string()
    }

    pub fn is_valid_uri(value: &str) -> bool {
        Iri::parse(value).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_wraps_and_validates() {
        assert_eq!(SparqlArg::uri("http://ex/a").unwrap(), "<http://ex/a>");
        assert!(SparqlArg::uri("http://ex/a> } DROP ALL {").is_err());
        assert!(SparqlArg::uri("relative/path").is_err());
    }

    #[test]
    fn test_uris_separator() {
        let list = SparqlArg::uris(["http://ex/a", "http://ex/b"], ", ").unwrap();
        assert_eq!(list, "<http://ex/a>, <http://ex/b>");
        assert!(SparqlArg::uris(["http://ex/a", "bad iri"], " ").is_err());
    }

    #[test]
    fn test_string_is_escaped() {
        assert_eq!(SparqlArg::string("a\"b"), "\"a\\\"b\"");
        assert_eq!(SparqlArg::string("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn test_is_valid_uri() {
        assert!(SparqlArg::is_valid_uri("urn:uuid:1234"));
        assert!(!SparqlArg::is_valid_uri("not a uri"));
    }
}
