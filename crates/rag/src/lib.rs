//! Knowledge retrieval for response injection
//!
//! Features:
//! - Query embeddings through an OpenAI-compatible HTTP endpoint
//! - Dense similarity search via Qdrant
//! - Top-k answer snippets assembled into a single context string
//! - Static fallback retriever for deployments without a knowledge base
//!
//! The relay only sees the `KnowledgeRetriever` trait from the core crate.

pub mod embeddings;
pub mod retriever;
pub mod vector_store;

pub use embeddings::{Embedder, EmbeddingConfig, HttpEmbedder};
pub use retriever::{RetrieverConfig, StaticRetriever, VectorKnowledgeRetriever};
pub use vector_store::{SimilarityIndex, VectorMatch, VectorStore, VectorStoreConfig};

use thiserror::Error;
use voice_bridge_core::RetrievalError;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<RagError> for RetrievalError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(msg) => RetrievalError::Embedding(msg),
            RagError::Search(msg) | RagError::VectorStore(msg) => RetrievalError::Search(msg),
            RagError::Connection(msg) => RetrievalError::Unavailable(msg),
        }
    }
}
