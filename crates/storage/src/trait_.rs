//! Vector store trait abstraction.

use async_trait::async_trait;
use tracing::debug;

/// Error type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Scalar metadata attached to a stored document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store rejected the request shape, e.g. a text query against a
    /// collection without an embedding function
    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),

    /// Collection or document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response
    #[error("Store returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response violated the parallel-array contract
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Resolved reference to a collection.
///
/// Obtained once at startup and passed to every call afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    id: String,
    name: String,
}

impl CollectionHandle {
    /// Create a handle from a store-assigned id and its name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Store-assigned collection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A document to write.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Document id
    pub id: String,
    /// Document text
    pub document: String,
    /// Scalar metadata
    pub metadata: Metadata,
    /// Precomputed vector; `None` leaves embedding to the store
    pub embedding: Option<Vec<f32>>,
}

/// What to search with.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Precomputed query vector
    Embedding(Vec<f32>),
    /// Raw text for the store to embed
    Text(String),
}

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document id
    pub id: String,
    /// Document text
    pub document: String,
    /// Scalar metadata
    pub metadata: Metadata,
}

/// A query result with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    /// The matched document
    pub document: StoredDocument,
    /// Distance to the query, smaller is closer
    pub distance: f32,
}

/// Query results as parallel arrays, nearest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    /// Document ids
    pub ids: Vec<String>,
    /// Document texts
    pub documents: Vec<String>,
    /// Document metadata
    pub metadatas: Vec<Metadata>,
    /// Distances
    pub distances: Vec<f32>,
}

impl QueryResponse {
    /// Zip the parallel arrays into hits.
    pub fn into_hits(self) -> Result<Vec<QueryHit>> {
        let n = self.ids.len();
        if self.documents.len() != n || self.metadatas.len() != n || self.distances.len() != n {
            return Err(StoreError::Malformed(format!(
                "query arrays differ in length: ids={}, documents={}, metadatas={}, distances={}",
                n,
                self.documents.len(),
                self.metadatas.len(),
                self.distances.len()
            )));
        }

        Ok(self
            .ids
            .into_iter()
            .zip(self.documents)
            .zip(self.metadatas)
            .zip(self.distances)
            .map(|(((id, document), metadata), distance)| QueryHit {
                document: StoredDocument {
                    id,
                    document,
                    metadata,
                },
                distance,
            })
            .collect())
    }
}

/// Full collection dump as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetResponse {
    /// Document ids
    pub ids: Vec<String>,
    /// Document texts
    pub documents: Vec<String>,
    /// Document metadata
    pub metadatas: Vec<Metadata>,
}

impl GetResponse {
    /// Zip the parallel arrays into documents.
    pub fn into_documents(self) -> Result<Vec<StoredDocument>> {
        let n = self.ids.len();
        if self.documents.len() != n || self.metadatas.len() != n {
            return Err(StoreError::Malformed(format!(
                "get arrays differ in length: ids={}, documents={}, metadatas={}",
                n,
                self.documents.len(),
                self.metadatas.len()
            )));
        }

        Ok(self
            .ids
            .into_iter()
            .zip(self.documents)
            .zip(self.metadatas)
            .map(|((id, document), metadata)| StoredDocument {
                id,
                document,
                metadata,
            })
            .collect())
    }
}

/// Document/vector store abstraction.
///
/// Implementations must treat `add` as upsert-by-id and make
/// `create_collection` idempotent for an existing name.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// List all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionHandle>>;

    /// Create a collection, or return the existing one with that name.
    async fn create_collection(&self, name: &str, metadata: &Metadata) -> Result<CollectionHandle>;

    /// Look up a collection by name, creating it if absent.
    async fn ensure_collection(&self, name: &str, metadata: &Metadata) -> Result<CollectionHandle> {
        if let Some(existing) = self
            .list_collections()
            .await?
            .into_iter()
            .find(|c| c.name() == name)
        {
            debug!("Using existing collection {} ({})", name, existing.id());
            return Ok(existing);
        }

        debug!("Creating collection {}", name);
        self.create_collection(name, metadata).await
    }

    /// Insert or overwrite documents by id.
    async fn add(&self, handle: &CollectionHandle, records: &[DocumentRecord]) -> Result<()>;

    /// Return up to `n_results` documents nearest to the query, nearest first.
    async fn query(
        &self,
        handle: &CollectionHandle,
        query: &QueryInput,
        n_results: usize,
    ) -> Result<QueryResponse>;

    /// Return every document in the collection.
    async fn get(&self, handle: &CollectionHandle) -> Result<GetResponse>;

    /// Delete documents by id, returning how many existed.
    async fn delete(&self, handle: &CollectionHandle, ids: &[String]) -> Result<usize>;
}
