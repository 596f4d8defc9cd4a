//! Chroma HTTP backend for the semantic stock index
//!
//! Implements [`VectorBackend`] against a Chroma-style vector server. The
//! server owns the embedding engine; this client only moves documents and
//! metadata over its REST API.

use crate::error::{Result, UniverseError};
use crate::index::{IndexEntry, VectorBackend};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for a Chroma vector server
#[derive(Debug, Clone)]
pub struct ChromaBackend {
    client: Client,
    base: Url,
}

impl ChromaBackend {
    /// Create a backend for the given base URL (e.g. "http://localhost:8000")
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, base })
    }

    /// Create a backend from `CHROMA_HOST` / `CHROMA_PORT` environment
    /// variables, defaulting to localhost:8000
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("CHROMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var("CHROMA_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self::new(&format!("http://{host}:{port}"))
    }

    fn api_url(&self, path: &str) -> String {
        // The base may carry a path prefix (reverse proxy); strip its
        // trailing slash before appending so neither form doubles up.
        let base = self.base.as_str().trim_end_matches('/');
        format!("{base}/api/v1/{path}")
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(UniverseError::Backend(format!("HTTP {status}: {body}")))
        }
    }
}

#[async_trait]
impl VectorBackend for ChromaBackend {
    async fn heartbeat(&self) -> Result<()> {
        let response = self.client.get(self.api_url("heartbeat")).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn ensure_collection(
        &self,
        name: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String> {
        let request = CreateCollectionRequest {
            name,
            metadata,
            get_or_create: true,
        };

        let response = self
            .client
            .post(self.api_url("collections"))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let collection: CollectionResponse = response.json().await.map_err(|e| {
            UniverseError::Backend(format!("Failed to parse collection response: {e}"))
        })?;

        debug!("Collection {name} has id {}", collection.id);
        Ok(collection.id)
    }

    async fn count(&self, collection_id: &str) -> Result<usize> {
        let response = self
            .client
            .get(self.api_url(&format!("collections/{collection_id}/count")))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        response
            .json::<usize>()
            .await
            .map_err(|e| UniverseError::Backend(format!("Failed to parse count response: {e}")))
    }

    async fn add(&self, collection_id: &str, entries: &[IndexEntry]) -> Result<()> {
        let request = AddRequest {
            ids: entries.iter().map(|e| e.id.as_str()).collect(),
            documents: entries.iter().map(|e| e.document.as_str()).collect(),
            metadatas: entries.iter().map(|e| &e.metadata).collect(),
        };

        let response = self
            .client
            .post(self.api_url(&format!("collections/{collection_id}/add")))
            .json(&request)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        top_n: usize,
    ) -> Result<Vec<BTreeMap<String, String>>> {
        let request = QueryRequest {
            query_texts: vec![text],
            n_results: top_n,
            include: vec!["metadatas"],
        };

        let response = self
            .client
            .post(self.api_url(&format!("collections/{collection_id}/query")))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| UniverseError::Backend(format!("Failed to parse query response: {e}")))?;

        // One metadata list per query text; we always send exactly one.
        Ok(result.metadatas.into_iter().next().unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: &'a BTreeMap<String, String>,
    get_or_create: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    documents: Vec<&'a str>,
    metadatas: Vec<&'a BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_texts: Vec<&'a str>,
    n_results: usize,
    include: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    metadatas: Vec<Vec<BTreeMap<String, String>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_composition() {
        let backend = ChromaBackend::new("http://localhost:8000").expect("backend");
        assert_eq!(
            backend.api_url("heartbeat"),
            "http://localhost:8000/api/v1/heartbeat"
        );
        assert_eq!(
            backend.api_url("collections/abc/query"),
            "http://localhost:8000/api/v1/collections/abc/query"
        );
    }

    #[test]
    fn test_backend_url_with_path_prefix() {
        let backend = ChromaBackend::new("http://localhost:8000/chroma").expect("backend");
        assert_eq!(
            backend.api_url("heartbeat"),
            "http://localhost:8000/chroma/api/v1/heartbeat"
        );

        let backend = ChromaBackend::new("http://localhost:8000/chroma/").expect("backend");
        assert_eq!(
            backend.api_url("heartbeat"),
            "http://localhost:8000/chroma/api/v1/heartbeat"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ChromaBackend::new("not a url");
        assert!(matches!(result, Err(UniverseError::InvalidUrl(_))));
    }

    #[test]
    fn test_query_response_parsing() {
        let json = r#"{"metadatas": [[{"symbol": "RELIANCE", "company_name": "reliance industries"}]]}"#;
        let parsed: QueryResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.metadatas.len(), 1);
        assert_eq!(parsed.metadatas[0][0]["symbol"], "RELIANCE");
    }
}
