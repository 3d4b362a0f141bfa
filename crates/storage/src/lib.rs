//! Vector store abstraction and implementations.
//!
//! This crate provides a trait-based document/vector store interface with an
//! in-process reference implementation and a Chroma REST client.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod chroma;

pub use trait_::{
    CollectionHandle, DocumentRecord, GetResponse, Metadata, QueryHit, QueryInput,
    QueryResponse, Result, StoreError, StoredDocument, VectorStore,
};
pub use memory::InMemoryVectorStore;
pub use chroma::ChromaVectorStore;
