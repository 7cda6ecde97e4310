//! HTTP [`SearchBackend`] for an Elasticsearch-compatible cluster.
//!
//! # Example
//!
//! ```no_run
//! use places_core::{CursorPaginator, PlaceStore};
//! use places_data::{Connection, ConnectionSettings, HttpSearchBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = Connection::open(&ConnectionSettings::from_env())?;
//! let store = CursorPaginator::new(HttpSearchBackend::new(connection, "places"));
//! let page = store.get_places(10, 0).await?;
//! println!("{} of {}", page.len(), page.total_matched);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use log::debug;
use places_core::{BackendError, QueryDocument, SearchBackend, SearchResponse};
use reqwest::Method;

use crate::Connection;

/// Runs queries with `POST {url}/{index}/_search`.
#[derive(Debug, Clone)]
pub struct HttpSearchBackend {
    connection: Connection,
    index: String,
}

impl HttpSearchBackend {
    /// Query `index` through `connection`.
    pub fn new(connection: Connection, index: impl Into<String>) -> Self {
        Self {
            connection,
            index: index.into(),
        }
    }

    /// Name of the queried index.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    fn search_url(&self) -> String {
        self.connection.endpoint(&format!("{}/_search", self.index))
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &QueryDocument) -> Result<SearchResponse, BackendError> {
        let url = self.search_url();
        debug!("searching {url} with size {}", query.size);
        let response = self
            .connection
            .request(Method::POST, &url)
            .json(query)
            .send()
            .await
            .map_err(|err| self.connection.convert_reqwest_error(&err, &url))?
            .error_for_status()
            .map_err(|err| self.connection.convert_reqwest_error(&err, &url))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| self.connection.convert_reqwest_error(&err, &url))?;
        serde_json::from_slice(&body).map_err(|err| BackendError::MalformedResponse {
            url,
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionSettings;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        Connection::open(&ConnectionSettings::default().with_url("http://localhost:9200"))
            .expect("connection should build")
    }

    #[rstest]
    fn search_url_targets_index(connection: Connection) {
        let backend = HttpSearchBackend::new(connection, "places");
        assert_eq!(backend.search_url(), "http://localhost:9200/places/_search");
        assert_eq!(backend.index(), "places");
    }
}
