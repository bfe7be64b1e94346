//! SPARQL query surface
//!
//! The [`Connection`] trait is the only way the engine talks to a store.
//! Two implementations ship with the crate:
//!
//! - [`HttpConnection`]: SPARQL 1.1 protocol over HTTP (Virtuoso and friends)
//! - [`MemoryConnection`]: an embedded oxigraph store
//!
//! Query text is assembled elsewhere; every URI and literal placed in it is
//! rendered through [`SparqlArg`].

mod arg;
mod connection;
mod http;
mod memory;
mod results;

pub use arg::SparqlArg;
pub use connection::{Connection, ConnectionError, ConnectionResult, SparqlDialect};
pub use http::HttpConnection;
pub use memory::MemoryConnection;
pub use results::{parse_json_results, QueryResults, QuerySolution};
