//! Core traits for the voice bridge
//!
//! External capabilities the relay depends on are expressed as traits so a
//! session can run against fakes in tests and against real backends in the
//! server.
//!
//! ```text
//! Retrieval:
//!   - KnowledgeRetriever: free text -> context string for response injection
//! ```

mod retriever;

pub use retriever::{
    KnowledgeRetriever, RetrievalError, RetrievedContext, FALLBACK_CONTEXT, MAX_CONTEXT_SNIPPETS,
};
