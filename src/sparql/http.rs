//! SPARQL 1.1 protocol client
//!
//! Queries go out as `application/sparql-query`, updates as
//! `application/sparql-update`. SELECT/ASK answers are read as SPARQL JSON,
//! CONSTRUCT answers as N-Triples or Turtle depending on the response type.

use super::connection::{Connection, ConnectionError, ConnectionResult, SparqlDialect};
use super::results::{parse_json_results, QueryResults};
use crate::config::ConnectionConfig;
use crate::rdf::{self, RdfFormat};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info};

const QUERY_ACCEPT: &str =
    "application/sparql-results+json, application/n-triples;q=0.9, text/turtle;q=0.8";

/// Blocking HTTP connection to a SPARQL endpoint
pub struct HttpConnection {
    client: Client,
    endpoint: String,
    update_endpoint: String,
    dialect: SparqlDialect,
}

impl HttpConnection {
    pub fn new(config: &ConnectionConfig) -> ConnectionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConnectionError::Setup(e.to_string()))?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let update_endpoint = config
            .update_endpoint
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| endpoint.clone());

        info!("SPARQL endpoint: {} (updates: {})", endpoint, update_endpoint);

        Ok(Self {
            client,
            endpoint,
            update_endpoint,
            dialect: config.dialect,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST a body and return (content type, response text)
    fn post(&self, url: &str, content_type: &str, body: &str) -> Result<(String, String), String> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, QUERY_ACCEPT)
            .body(body.to_string())
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let response_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response.text().map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("Endpoint returned {}: {}", status, text.trim()));
        }
        Ok((response_type, text))
    }
}

impl Connection for HttpConnection {
    fn query(&self, query: &str) -> ConnectionResult<QueryResults> {
        debug!("SPARQL query:\n{}", query);

        let (response_type, body) = self
            .post(&self.endpoint, "application/sparql-query", query)
            .map_err(|message| ConnectionError::query(query, message))?;

        match RdfFormat::from_media_type(&response_type) {
            Some(format) => rdf::parse(format, &body)
                .map(QueryResults::Graph)
                .map_err(|e| ConnectionError::query(query, e)),
            None => parse_json_results(&body).map_err(|e| ConnectionError::query(query, e)),
        }
    }

    fn update(&self, update: &str) -> ConnectionResult<()> {
        debug!("SPARQL update:\n{}", update);

        self.post(&self.update_endpoint, "application/sparql-update", update)
            .map(|_| ())
            .map_err(|message| ConnectionError::update(update, message))
    }

    fn dialect(&self) -> SparqlDialect {
        self.dialect
    }
}
