//! In-process vector store.
//!
//! Keeps documents in insertion order and answers vector queries by brute
//! force cosine distance. There is no embedding function, so text queries
//! are rejected with [`StoreError::UnsupportedRequest`]. Vector queries are
//! rejected the same way while any record in the collection has no vector,
//! since those records could never be ranked.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    CollectionHandle, DocumentRecord, GetResponse, Metadata, QueryInput, QueryResponse, Result,
    StoreError, VectorStore,
};

struct MemoryCollection {
    handle: CollectionHandle,
    records: Vec<DocumentRecord>,
}

/// In-memory vector store implementation.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    collections: Arc<Mutex<Vec<MemoryCollection>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn find<'a>(
    collections: &'a mut [MemoryCollection],
    handle: &CollectionHandle,
) -> Result<&'a mut MemoryCollection> {
    collections
        .iter_mut()
        .find(|c| c.handle.id() == handle.id())
        .ok_or_else(|| StoreError::NotFound(format!("collection {}", handle.name())))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn list_collections(&self) -> Result<Vec<CollectionHandle>> {
        let collections = self.collections.lock().await;
        Ok(collections.iter().map(|c| c.handle.clone()).collect())
    }

    async fn create_collection(&self, name: &str, _metadata: &Metadata) -> Result<CollectionHandle> {
        let mut collections = self.collections.lock().await;
        if let Some(existing) = collections.iter().find(|c| c.handle.name() == name) {
            return Ok(existing.handle.clone());
        }

        let handle = CollectionHandle::new(format!("mem-{}", collections.len()), name);
        collections.push(MemoryCollection {
            handle: handle.clone(),
            records: Vec::new(),
        });
        Ok(handle)
    }

    async fn add(&self, handle: &CollectionHandle, records: &[DocumentRecord]) -> Result<()> {
        let mut collections = self.collections.lock().await;
        let collection = find(&mut collections, handle)?;

        for record in records {
            match collection.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => collection.records.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        handle: &CollectionHandle,
        query: &QueryInput,
        n_results: usize,
    ) -> Result<QueryResponse> {
        let query_embedding = match query {
            QueryInput::Embedding(embedding) => embedding,
            QueryInput::Text(_) => {
                return Err(StoreError::UnsupportedRequest(
                    "collection has no embedding function; query by embedding instead".to_string(),
                ))
            }
        };

        let mut collections = self.collections.lock().await;
        let collection = find(&mut collections, handle)?;

        let missing = collection.records.iter().filter(|r| r.embedding.is_none()).count();
        if missing > 0 {
            return Err(StoreError::UnsupportedRequest(format!(
                "{} of {} records in {} have no embedding",
                missing,
                collection.records.len(),
                handle.name()
            )));
        }

        let mut scored = Vec::new();
        for record in &collection.records {
            let Some(embedding) = &record.embedding else {
                continue;
            };
            if embedding.len() != query_embedding.len() {
                return Err(StoreError::Other(format!(
                    "embedding dimension {} does not match collection dimension {}",
                    query_embedding.len(),
                    embedding.len()
                )));
            }
            let distance = 1.0 - cosine_similarity(query_embedding, embedding);
            scored.push((record, distance));
        }

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_results);
        debug!("Vector query over {} returned {} hits", handle.name(), scored.len());

        let mut response = QueryResponse::default();
        for (record, distance) in scored {
            response.ids.push(record.id.clone());
            response.documents.push(record.document.clone());
            response.metadatas.push(record.metadata.clone());
            response.distances.push(distance);
        }
        Ok(response)
    }

    async fn get(&self, handle: &CollectionHandle) -> Result<GetResponse> {
        let mut collections = self.collections.lock().await;
        let collection = find(&mut collections, handle)?;

        let mut response = GetResponse::default();
        for record in &collection.records {
            response.ids.push(record.id.clone());
            response.documents.push(record.document.clone());
            response.metadatas.push(record.metadata.clone());
        }
        Ok(response)
    }

    async fn delete(&self, handle: &CollectionHandle, ids: &[String]) -> Result<usize> {
        let mut collections = self.collections.lock().await;
        let collection = find(&mut collections, handle)?;

        let before = collection.records.len();
        collection.records.retain(|r| !ids.contains(&r.id));
        Ok(before - collection.records.len())
    }
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
