//! Knowledge retrieval trait

use async_trait::async_trait;
use thiserror::Error;

/// Context used when nothing relevant was found or retrieval failed
pub const FALLBACK_CONTEXT: &str = "No relevant context.";

/// Upper bound on snippets assembled into one context
pub const MAX_CONTEXT_SNIPPETS: usize = 3;

/// Why a retrieval produced no context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Similarity search failed: {0}")]
    Search(String),

    #[error("Retriever unavailable: {0}")]
    Unavailable(String),
}

/// Context string assembled from matched knowledge snippets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedContext {
    text: String,
    snippet_count: usize,
}

impl RetrievedContext {
    /// Join up to [`MAX_CONTEXT_SNIPPETS`] non-empty snippets with newlines.
    /// Yields the fallback sentinel when there are none.
    pub fn from_snippets<I, S>(snippets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kept: Vec<String> = snippets
            .into_iter()
            .filter_map(|s| {
                let s = s.as_ref().trim();
                (!s.is_empty()).then(|| s.to_string())
            })
            .take(MAX_CONTEXT_SNIPPETS)
            .collect();

        if kept.is_empty() {
            return Self::fallback();
        }

        Self {
            snippet_count: kept.len(),
            text: kept.join("\n"),
        }
    }

    /// The "no relevant context" sentinel
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_CONTEXT.to_string(),
            snippet_count: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn snippet_count(&self) -> usize {
        self.snippet_count
    }

    pub fn is_fallback(&self) -> bool {
        self.snippet_count == 0
    }
}

impl From<Result<RetrievedContext, RetrievalError>> for RetrievedContext {
    fn from(result: Result<RetrievedContext, RetrievalError>) -> Self {
        result.unwrap_or_else(|_| RetrievedContext::fallback())
    }
}

/// Converts free text into context for the agent's next response
///
/// Implementations:
/// - `VectorKnowledgeRetriever` - embeddings + similarity index
/// - `StaticRetriever` - always the fallback (retrieval disabled)
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync + 'static {
    /// Retrieve context for a finalized user utterance
    async fn retrieve(&self, query: &str) -> Result<RetrievedContext, RetrievalError>;

    /// Retriever name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippets_joined() {
        let ctx = RetrievedContext::from_snippets(["Course A info", "Course B info"]);
        assert_eq!(ctx.as_str(), "Course A info\nCourse B info");
        assert_eq!(ctx.snippet_count(), 2);
        assert!(!ctx.is_fallback());
    }

    #[test]
    fn test_snippets_bounded() {
        let ctx = RetrievedContext::from_snippets(["a", "b", "c", "d"]);
        assert_eq!(ctx.as_str(), "a\nb\nc");
    }

    #[test]
    fn test_empty_snippets_fall_back() {
        let ctx = RetrievedContext::from_snippets(Vec::<String>::new());
        assert_eq!(ctx.as_str(), FALLBACK_CONTEXT);
        assert!(ctx.is_fallback());

        let ctx = RetrievedContext::from_snippets(["", "   "]);
        assert!(ctx.is_fallback());
    }

    #[test]
    fn test_error_maps_to_fallback() {
        let ctx: RetrievedContext = Err(RetrievalError::Search("timeout".into())).into();
        assert_eq!(ctx.as_str(), FALLBACK_CONTEXT);
    }
}
