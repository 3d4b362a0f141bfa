//! Knowledge base: embeddings, document codec, repository and similarity search.

#![warn(missing_docs)]

pub mod embedding;
pub mod codec;
pub mod repository;
pub mod similarity;
pub mod seed;

pub use embedding::{DisabledEmbeddings, EmbeddingError, EmbeddingProvider, OllamaEmbeddingClient};
pub use repository::{distance_to_similarity, KnowledgeRepository, RepositoryError, ScoredEntry};
pub use similarity::{KeywordScorer, SimilarityEngine};
