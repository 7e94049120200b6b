//! Knowledge retrievers
//!
//! `VectorKnowledgeRetriever` embeds the caller's question, searches the
//! index and joins the `answer` payloads of the best matches. Matches without
//! the answer field are skipped.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use voice_bridge_config::RagConfig;
use voice_bridge_core::{
    KnowledgeRetriever, RetrievalError, RetrievedContext, MAX_CONTEXT_SNIPPETS,
};

use crate::{Embedder, SimilarityIndex};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Matches requested from the index, capped at `MAX_CONTEXT_SNIPPETS`
    pub top_k: usize,
    /// Payload field holding the snippet text
    pub answer_field: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: MAX_CONTEXT_SNIPPETS,
            answer_field: "answer".to_string(),
        }
    }
}

impl From<&RagConfig> for RetrieverConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            top_k: config.top_k,
            answer_field: config.answer_field.clone(),
        }
    }
}

/// Embeddings + similarity index retriever
pub struct VectorKnowledgeRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilarityIndex>,
    config: RetrieverConfig,
}

impl VectorKnowledgeRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SimilarityIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for VectorKnowledgeRetriever {
    async fn retrieve(&self, query: &str) -> Result<RetrievedContext, RetrievalError> {
        let start = Instant::now();
        let top_k = self.config.top_k.clamp(1, MAX_CONTEXT_SNIPPETS);

        let embedding = self.embedder.embed(query).await?;
        let matches = self.index.search(&embedding, top_k).await?;

        let snippets = matches
            .iter()
            .filter_map(|m| m.payload.get(&self.config.answer_field));
        let context = RetrievedContext::from_snippets(snippets);

        tracing::debug!(
            model = self.embedder.model(),
            matches = matches.len(),
            snippets = context.snippet_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Knowledge retrieval complete"
        );

        Ok(context)
    }

    fn name(&self) -> &str {
        "vector"
    }
}

/// Retriever used when no knowledge base is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticRetriever;

#[async_trait]
impl KnowledgeRetriever for StaticRetriever {
    async fn retrieve(&self, _query: &str) -> Result<RetrievedContext, RetrievalError> {
        Ok(RetrievedContext::fallback())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RagError, VectorMatch};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use voice_bridge_core::FALLBACK_CONTEXT;

    /// Records the arguments a fake was called with
    #[derive(Default)]
    struct Recorder<T>(Mutex<Vec<T>>);

    impl<T: Clone> Recorder<T> {
        fn push(&self, value: T) {
            self.0.lock().unwrap().push(value);
        }

        fn all(&self) -> Vec<T> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeEmbedder {
        fail: bool,
        queries: Recorder<String>,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            self.queries.push(text.to_string());
            if self.fail {
                return Err(RagError::Embedding("quota exceeded".to_string()));
            }
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    struct FakeIndex {
        matches: Vec<VectorMatch>,
        requested_k: Recorder<usize>,
    }

    #[async_trait]
    impl SimilarityIndex for FakeIndex {
        async fn search(&self, _embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, RagError> {
            self.requested_k.push(top_k);
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }
    }

    fn hit(answer: Option<&str>) -> VectorMatch {
        let mut payload = HashMap::new();
        payload.insert("question".to_string(), "q".to_string());
        if let Some(a) = answer {
            payload.insert("answer".to_string(), a.to_string());
        }
        VectorMatch { score: 0.9, payload }
    }

    fn retriever(matches: Vec<VectorMatch>, fail: bool) -> (VectorKnowledgeRetriever, Arc<FakeEmbedder>, Arc<FakeIndex>) {
        let embedder = Arc::new(FakeEmbedder {
            fail,
            queries: Recorder::default(),
        });
        let index = Arc::new(FakeIndex {
            matches,
            requested_k: Recorder::default(),
        });
        let r = VectorKnowledgeRetriever::new(embedder.clone(), index.clone(), RetrieverConfig::default());
        (r, embedder, index)
    }

    #[tokio::test]
    async fn test_answers_joined() {
        let (r, embedder, index) = retriever(
            vec![hit(Some("Course A info")), hit(None), hit(Some("Course B info")), hit(Some("late"))],
            false,
        );
        let ctx = r.retrieve("What courses do you offer?").await.unwrap();

        // the match without an answer is skipped, and only three were requested
        assert_eq!(ctx.as_str(), "Course A info\nCourse B info");
        assert_eq!(embedder.queries.all(), vec!["What courses do you offer?".to_string()]);
        assert_eq!(index.requested_k.all(), vec![3]);
    }

    #[tokio::test]
    async fn test_no_matches_is_fallback() {
        let (r, _, _) = retriever(vec![], false);
        let ctx = r.retrieve("anything").await.unwrap();
        assert_eq!(ctx.as_str(), FALLBACK_CONTEXT);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_typed() {
        let (r, _, index) = retriever(vec![hit(Some("x"))], true);
        let err = r.retrieve("anything").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert!(index.requested_k.all().is_empty());
    }

    #[tokio::test]
    async fn test_static_retriever() {
        let ctx = StaticRetriever.retrieve("hello").await.unwrap();
        assert!(ctx.is_fallback());
        assert_eq!(StaticRetriever.name(), "static");
    }
}
