//! Knowledge repository: knowledge entries on top of a vector store.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use triage_core::{clamp_unit, KnowledgeEntry, KnowledgeEntryId};
use triage_storage::{
    CollectionHandle, DocumentRecord, Metadata, QueryInput, StoreError, VectorStore,
};

use crate::codec;
use crate::embedding::EmbeddingProvider;
use crate::seed;

/// Error type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Entry rejected before reaching the store
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),
}

/// A decoded entry with its distance to a query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    /// The decoded entry
    pub entry: KnowledgeEntry,
    /// Raw store distance
    pub distance: f32,
    /// `max(0, 1 - distance)`
    pub similarity: f32,
}

/// Convert a store distance into a similarity in `[0, 1]`.
pub fn distance_to_similarity(distance: f32) -> f32 {
    clamp_unit(1.0 - distance)
}

/// Knowledge entries stored as documents plus metadata.
#[derive(Clone)]
pub struct KnowledgeRepository {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl KnowledgeRepository {
    /// Create a repository over a store and an embedding provider.
    pub fn new(store: Arc<dyn VectorStore>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embeddings }
    }

    /// The embedding provider used for writes and queries.
    pub fn embeddings(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embeddings
    }

    /// Resolve the knowledge collection, creating it if needed.
    ///
    /// Call once at startup and share the returned handle.
    pub async fn initialize(&self, collection: &str) -> Result<CollectionHandle> {
        let mut metadata = Metadata::new();
        metadata.insert(
            "description".into(),
            Value::from("Solved incidents reusable as cached resolutions"),
        );
        metadata.insert("hnsw:space".into(), Value::from("cosine"));

        let handle = self.store.ensure_collection(collection, &metadata).await?;
        info!("Knowledge collection {} ready ({})", handle.name(), handle.id());
        Ok(handle)
    }

    /// Add or overwrite an entry.
    ///
    /// The vector is computed through the embedding provider when it is
    /// available; otherwise the document is stored without one.
    pub async fn add(&self, handle: &CollectionHandle, entry: &KnowledgeEntry) -> Result<()> {
        if entry.id.as_str().trim().is_empty() {
            return Err(RepositoryError::InvalidEntry("empty id".to_string()));
        }

        let entry = entry.clone().normalized();
        let document = codec::encode(&entry);
        let embedding = self.embed_document(&document).await;

        let record = DocumentRecord {
            id: entry.id.to_string(),
            document,
            metadata: codec::to_metadata(&entry),
            embedding,
        };
        self.store.add(handle, &[record]).await?;
        debug!("Stored knowledge entry {} ({})", entry.id, entry.pattern_type);
        Ok(())
    }

    async fn embed_document(&self, document: &str) -> Option<Vec<f32>> {
        if !self.embeddings.is_available().await {
            return None;
        }
        match self.embeddings.generate_embedding(document).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Storing entry without embedding: {}", e);
                None
            }
        }
    }

    /// Add several entries, returning how many were stored.
    pub async fn add_all(&self, handle: &CollectionHandle, entries: &[KnowledgeEntry]) -> Result<usize> {
        let mut count = 0;
        for entry in entries {
            self.add(handle, entry).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Up to `k` entries nearest to the query with similarity at least
    /// `threshold`, nearest first.
    pub async fn query(
        &self,
        handle: &CollectionHandle,
        query: &QueryInput,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredEntry>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.store.query(handle, query, k).await?.into_hits()?;
        Ok(hits
            .into_iter()
            .map(|hit| ScoredEntry {
                entry: codec::from_document(&hit.document),
                distance: hit.distance,
                similarity: distance_to_similarity(hit.distance),
            })
            .filter(|scored| scored.similarity >= threshold)
            .take(k)
            .collect())
    }

    /// Every stored entry, in store enumeration order.
    pub async fn get_all(&self, handle: &CollectionHandle) -> Result<Vec<KnowledgeEntry>> {
        let documents = self.store.get(handle).await?.into_documents()?;
        Ok(documents.iter().map(codec::from_document).collect())
    }

    /// Look up one entry by id.
    pub async fn get(&self, handle: &CollectionHandle, id: &KnowledgeEntryId) -> Result<Option<KnowledgeEntry>> {
        Ok(self
            .get_all(handle)
            .await?
            .into_iter()
            .find(|entry| &entry.id == id))
    }

    /// Delete an entry. Returns `false` if it did not exist.
    pub async fn delete(&self, handle: &CollectionHandle, id: &KnowledgeEntryId) -> Result<bool> {
        let removed = self.store.delete(handle, &[id.to_string()]).await?;
        if removed > 0 {
            info!("Deleted knowledge entry {}", id);
        }
        Ok(removed > 0)
    }

    /// Replace an entry: delete by id, then add.
    pub async fn replace(&self, handle: &CollectionHandle, entry: &KnowledgeEntry) -> Result<()> {
        self.delete(handle, &entry.id).await?;
        self.add(handle, entry).await
    }

    /// Load the built-in seed set into an empty collection.
    ///
    /// Returns the number of entries added; a non-empty collection is left
    /// untouched.
    pub async fn seed_if_empty(&self, handle: &CollectionHandle) -> Result<usize> {
        let existing = self.store.get(handle).await?;
        if !existing.ids.is_empty() {
            debug!("Collection {} already holds {} entries", handle.name(), existing.ids.len());
            return Ok(0);
        }

        let added = self.add_all(handle, &seed::seed_entries()).await?;
        info!("Seeded {} knowledge entries into {}", added, handle.name());
        Ok(added)
    }
}
