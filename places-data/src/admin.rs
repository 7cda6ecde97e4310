//! Index lifecycle: drop and recreate the places index with its mapping.

use log::info;
use places_core::BackendError;
use reqwest::Method;
use serde_json::{Value, json};

use crate::Connection;

/// Mapping of the places index.
///
/// `id` is a `long` so the default sort has a unique, sortable tie-breaker;
/// `location` is a `geo_point` so distance sorting works.
#[must_use]
pub fn places_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": {"type": "long"},
                "name": {"type": "text"},
                "address": {"type": "text"},
                "phone": {"type": "text"},
                "location": {"type": "geo_point"}
            }
        }
    })
}

/// Administrative operations on one index.
#[derive(Debug, Clone)]
pub struct IndexAdmin {
    connection: Connection,
    index: String,
}

impl IndexAdmin {
    /// Manage `index` through `connection`.
    pub fn new(connection: Connection, index: impl Into<String>) -> Self {
        Self {
            connection,
            index: index.into(),
        }
    }

    /// Delete the index if present, then create it with [`places_mapping`].
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when either request fails.
    pub async fn recreate_index(&self) -> Result<(), BackendError> {
        let index_url = self.connection.endpoint(&self.index);
        let delete_url = format!("{index_url}?ignore_unavailable=true");
        self.send(Method::DELETE, &delete_url, None).await?;
        self.send(Method::PUT, &index_url, Some(&places_mapping()))
            .await?;
        info!("recreated index {}", self.index);
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(), BackendError> {
        let mut request = self.connection.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|err| self.connection.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.connection.convert_reqwest_error(&err, url))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn mapping_declares_geo_point_location() {
        let mapping = places_mapping();
        assert_eq!(
            mapping["mappings"]["properties"]["location"]["type"],
            "geo_point"
        );
        assert_eq!(mapping["mappings"]["properties"]["id"]["type"], "long");
    }
}
