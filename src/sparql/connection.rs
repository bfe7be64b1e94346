//! Connection contract between the engine and a triple store

use super::results::QueryResults;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection errors
///
/// Both failure variants keep the offending query text for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// SELECT/ASK/CONSTRUCT failed at transport or store level
    #[error("Execution of query failed: {query}")]
    Query { query: String, message: String },

    /// INSERT/DELETE failed at transport or store level
    #[error("Execution of query failed: {query}")]
    Update { query: String, message: String },

    /// Store answered with a result form the caller did not ask for
    #[error("Unexpected result form, expected {expected}")]
    UnexpectedResult { expected: &'static str },

    /// Client could not be constructed
    #[error("Connection setup failed: {0}")]
    Setup(String),
}

impl ConnectionError {
    pub(crate) fn query(query: &str, message: impl ToString) -> Self {
        ConnectionError::Query {
            query: query.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn update(query: &str, message: impl ToString) -> Self {
        ConnectionError::Update {
            query: query.to_string(),
            message: message.to_string(),
        }
    }

    /// Underlying transport/store message
    pub fn message(&self) -> String {
        match self {
            ConnectionError::Query { message, .. } | ConnectionError::Update { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Update syntax spoken by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SparqlDialect {
    /// `INSERT DATA INTO <g>` / `DELETE FROM <g>`
    #[default]
    Virtuoso,
    /// `INSERT DATA { GRAPH <g> … }` / `DELETE { GRAPH <g> … }`
    Sparql11,
}

/// A triple store endpoint
///
/// The engine is synchronous; implementations block until the store answers.
/// No retries happen at this level.
pub trait Connection: Send + Sync {
    /// Run a SELECT, ASK or CONSTRUCT query
    fn query(&self, query: &str) -> ConnectionResult<QueryResults>;

    /// Run an update
    fn update(&self, update: &str) -> ConnectionResult<()>;

    /// Update syntax to generate for this store
    fn dialect(&self) -> SparqlDialect;
}
