//! Chroma REST client.
//!
//! Talks to the `/api/v1` collection endpoints. `add` maps to `upsert` so a
//! pre-existing id is overwritten, and collection creation always passes
//! `get_or_create` so concurrent first-time callers converge on one
//! collection.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    CollectionHandle, DocumentRecord, GetResponse, Metadata, QueryInput, QueryResponse, Result,
    StoreError, VectorStore,
};

/// Chroma vector store client.
#[derive(Clone)]
pub struct ChromaVectorStore {
    /// HTTP client
    client: Client,

    /// Chroma server URL
    url: String,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct RawQueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Deserialize)]
struct RawGetResponse {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Metadata>>>,
}

impl ChromaVectorStore {
    /// Create a new client.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url: url.into().trim_end_matches('/').to_string(),
        }
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.url)
    }

    fn collection_url(&self, handle: &CollectionHandle, action: &str) -> String {
        format!("{}/api/v1/collections/{}/{}", self.url, handle.id(), action)
    }

    async fn upsert(&self, handle: &CollectionHandle, records: &[&DocumentRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut payload = json!({
            "ids": records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "documents": records.iter().map(|r| r.document.as_str()).collect::<Vec<_>>(),
            "metadatas": records.iter().map(|r| &r.metadata).collect::<Vec<_>>(),
        });
        let embeddings: Option<Vec<&Vec<f32>>> =
            records.iter().map(|r| r.embedding.as_ref()).collect();
        if let Some(embeddings) = embeddings {
            payload["embeddings"] = json!(embeddings);
        }

        let response = self
            .client
            .post(self.collection_url(handle, "upsert"))
            .json(&payload)
            .send()
            .await?;
        check_status(response, false).await?;
        Ok(())
    }

    async fn existing_ids(&self, handle: &CollectionHandle, ids: &[String]) -> Result<usize> {
        let response = self
            .client
            .post(self.collection_url(handle, "get"))
            .json(&json!({ "ids": ids, "include": [] }))
            .send()
            .await?;
        let raw: RawGetResponse = check_status(response, false).await?.json().await?;
        Ok(raw.ids.len())
    }
}

/// Map non-success responses to store errors.
///
/// With `client_error_unsupported`, 4xx responses other than 404 mean the
/// collection cannot serve this request shape.
async fn check_status(response: Response, client_error_unsupported: bool) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 404 {
        return Err(StoreError::NotFound(body));
    }
    if client_error_unsupported && status.is_client_error() {
        return Err(StoreError::UnsupportedRequest(body));
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

fn column<T: Default>(column: Option<Vec<Option<T>>>, len: usize) -> Vec<T> {
    match column {
        Some(values) => values.into_iter().map(Option::unwrap_or_default).collect(),
        None => std::iter::repeat_with(T::default).take(len).collect(),
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn list_collections(&self) -> Result<Vec<CollectionHandle>> {
        let response = self.client.get(self.collections_url()).send().await?;
        let collections: Vec<CollectionInfo> = check_status(response, false).await?.json().await?;
        Ok(collections
            .into_iter()
            .map(|c| CollectionHandle::new(c.id, c.name))
            .collect())
    }

    async fn create_collection(&self, name: &str, metadata: &Metadata) -> Result<CollectionHandle> {
        let mut payload = json!({ "name": name, "get_or_create": true });
        if !metadata.is_empty() {
            payload["metadata"] = Value::Object(metadata.clone());
        }

        let response = self
            .client
            .post(self.collections_url())
            .json(&payload)
            .send()
            .await?;
        let info: CollectionInfo = check_status(response, false).await?.json().await?;
        debug!("Collection {} resolved to {}", info.name, info.id);
        Ok(CollectionHandle::new(info.id, info.name))
    }

    async fn add(&self, handle: &CollectionHandle, records: &[DocumentRecord]) -> Result<()> {
        // Chroma needs embeddings for all records in a request or for none.
        let (with, without): (Vec<&DocumentRecord>, Vec<&DocumentRecord>) =
            records.iter().partition(|r| r.embedding.is_some());
        self.upsert(handle, &with).await?;
        self.upsert(handle, &without).await
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        query: &QueryInput,
        n_results: usize,
    ) -> Result<QueryResponse> {
        let mut payload = json!({
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        match query {
            QueryInput::Embedding(embedding) => payload["query_embeddings"] = json!([embedding]),
            QueryInput::Text(text) => payload["query_texts"] = json!([text]),
        }

        let response = self
            .client
            .post(self.collection_url(handle, "query"))
            .json(&payload)
            .send()
            .await?;
        let raw: RawQueryResponse = check_status(response, true).await?.json().await?;

        let ids = raw.ids.into_iter().next().unwrap_or_default();
        let len = ids.len();
        let documents = column(raw.documents.and_then(|d| d.into_iter().next()), len);
        let metadatas = column(raw.metadatas.and_then(|m| m.into_iter().next()), len);
        let distances = raw
            .distances
            .and_then(|d| d.into_iter().next())
            .ok_or_else(|| StoreError::Malformed("query response has no distances".to_string()))?;

        Ok(QueryResponse {
            ids,
            documents,
            metadatas,
            distances,
        })
    }

    async fn get(&self, handle: &CollectionHandle) -> Result<GetResponse> {
        let response = self
            .client
            .post(self.collection_url(handle, "get"))
            .json(&json!({ "include": ["documents", "metadatas"] }))
            .send()
            .await?;
        let raw: RawGetResponse = check_status(response, false).await?.json().await?;

        let len = raw.ids.len();
        Ok(GetResponse {
            ids: raw.ids,
            documents: column(raw.documents, len),
            metadatas: column(raw.metadatas, len),
        })
    }

    async fn delete(&self, handle: &CollectionHandle, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let existing = self.existing_ids(handle, ids).await?;
        if existing == 0 {
            warn!("Delete requested for unknown ids in {}", handle.name());
            return Ok(0);
        }

        let response = self
            .client
            .post(self.collection_url(handle, "delete"))
            .json(&json!({ "ids": ids }))
            .send()
            .await?;
        check_status(response, false).await?;
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_query_response_parses_nested_arrays() {
        let body = r#"{
            "ids": [["a", "b"]],
            "documents": [["doc a", null]],
            "metadatas": [[{"title": "A"}, null]],
            "distances": [[0.12, 0.5]]
        }"#;
        let raw: RawQueryResponse = serde_json::from_str(body).unwrap();
        let ids = raw.ids.into_iter().next().unwrap_or_default();
        let documents = column(raw.documents.and_then(|d| d.into_iter().next()), ids.len());
        assert_eq!(documents, vec!["doc a".to_string(), String::new()]);
    }

    #[test]
    fn test_column_defaults_missing_values() {
        let metadatas: Vec<Metadata> = column(None, 2);
        assert_eq!(metadatas.len(), 2);
        assert!(metadatas[0].is_empty());
    }

    #[test]
    fn test_urls() {
        let store = ChromaVectorStore::new("http://localhost:8000/", Duration::from_secs(1));
        let handle = CollectionHandle::new("abc", "kb");
        assert_eq!(store.collections_url(), "http://localhost:8000/api/v1/collections");
        assert_eq!(
            store.collection_url(&handle, "query"),
            "http://localhost:8000/api/v1/collections/abc/query"
        );
    }

    async fn mock_store(server: &mockito::ServerGuard) -> (ChromaVectorStore, CollectionHandle) {
        let store = ChromaVectorStore::new(server.url(), Duration::from_secs(5));
        (store, CollectionHandle::new("c1", "kb"))
    }

    fn embedding_query() -> QueryInput {
        QueryInput::Embedding(vec![0.1, 0.2])
    }

    #[tokio::test]
    async fn test_query_client_error_is_unsupported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/collections/c1/query")
            .with_status(400)
            .with_body("collection has no embedding function")
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        let result = store.query(&handle, &QueryInput::Text("disk".into()), 3).await;
        assert!(matches!(result, Err(StoreError::UnsupportedRequest(body)) if body.contains("embedding function")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", "/api/v1/collections/c1/query")
            .with_status(404)
            .with_body("collection c1 does not exist")
            .create_async()
            .await;
        let _get = server
            .mock("POST", "/api/v1/collections/c1/get")
            .with_status(404)
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        assert!(matches!(
            store.query(&handle, &embedding_query(), 3).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.get(&handle).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", "/api/v1/collections/c1/query")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;
        let _get = server
            .mock("POST", "/api/v1/collections/c1/get")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        assert!(matches!(
            store.query(&handle, &embedding_query(), 3).await,
            Err(StoreError::Status { status: 503, .. })
        ));
        assert!(matches!(
            store.get(&handle).await,
            Err(StoreError::Status { status: 500, .. })
        ));
        // Delete checks existing ids first, so the same failure surfaces there.
        assert!(matches!(
            store.delete(&handle, &["a".to_string()]).await,
            Err(StoreError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_query_without_distances_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", "/api/v1/collections/c1/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ids": [["a"]], "documents": [["doc a"]], "metadatas": [[{}]]}"#)
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        assert!(matches!(
            store.query(&handle, &embedding_query(), 3).await,
            Err(StoreError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_ragged_query_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", "/api/v1/collections/c1/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ids": [["a", "b"]], "documents": [["doc a", "doc b"]], "metadatas": [[{}, {}]], "distances": [[0.1]]}"#,
            )
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        let response = store.query(&handle, &embedding_query(), 3).await.unwrap();
        assert!(matches!(response.into_hits(), Err(StoreError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_query_parses_hits() {
        let mut server = mockito::Server::new_async().await;
        let _query = server
            .mock("POST", "/api/v1/collections/c1/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ids": [["a", "b"]], "documents": [["doc a", null]], "metadatas": [[{"title": "A"}, null]], "distances": [[0.12, 0.5]]}"#,
            )
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        let hits = store
            .query(&handle, &embedding_query(), 3)
            .await
            .unwrap()
            .into_hits()
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.document, "doc a");
        assert_eq!(hits[0].document.metadata["title"], "A");
        assert_eq!(hits[1].document.document, "");
        assert!((hits[1].distance - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_delete_counts_existing_ids() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("POST", "/api/v1/collections/c1/get")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ids": ["a"]}"#)
            .create_async()
            .await;
        let delete = server
            .mock("POST", "/api/v1/collections/c1/delete")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let (store, handle) = mock_store(&server).await;

        let removed = store
            .delete(&handle, &["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        delete.assert_async().await;
    }
}
