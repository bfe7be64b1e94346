//! RDF primitives used by the entity engine
//!
//! - Terms and triples wrapping oxrdf
//! - Namespace prefixes for compact IRIs in configuration
//! - N-Triples/Turtle reading and writing
//! - An ordered triple set used to assemble insert payloads
//!
//! # Example
//!
//! ```rust
//! use rdf_entity::rdf::{Literal, NamedNode, TripleGraph};
//!
//! let mut graph = TripleGraph::new();
//! let apple = NamedNode::new("http://example.org/apple").unwrap();
//! let label = NamedNode::new("http://www.w3.org/2000/01/rdf-schema#label").unwrap();
//! graph.add(apple.into(), label, Literal::new_simple_literal("Apple").into());
//!
//! assert_eq!(
//!     graph.to_ntriples().unwrap().trim(),
//!     "<http://example.org/apple> <http://www.w3.org/2000/01/rdf-schema#label> \"Apple\" ."
//! );
//! ```

mod graph;
mod namespace;
mod serialization;
mod types;

pub use types::{
    BlankNode, Literal, NamedNode, RdfError, RdfResult, RdfSubject, RdfTerm, Triple,
    RDF_LANG_STRING, XSD_STRING,
};

pub use namespace::{NamespaceManager, PrefixError, PrefixResult, RDF_NS, RDF_TYPE, XSD_NS};

pub use serialization::{parse, serialize, RdfFormat};

pub use graph::TripleGraph;
