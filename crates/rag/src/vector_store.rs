//! Vector Store using Qdrant
//!
//! Dense similarity search over the pre-indexed knowledge base. Indexing is
//! done offline; this side only queries.

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{value::Kind, SearchPointsBuilder},
    Qdrant,
};
use std::collections::HashMap;

use voice_bridge_config::RagConfig;

use crate::RagError;

/// Nearest-neighbour search over stored vectors
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Top `top_k` matches, best first
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, RagError>;
}

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub endpoint: String,
    pub collection: String,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl From<&RagConfig> for VectorStoreConfig {
    fn from(config: &RagConfig) -> Self {
        Self {
            endpoint: config.qdrant_endpoint.clone(),
            collection: config.qdrant_collection.clone(),
            api_key: config.qdrant_api_key.clone(),
        }
    }
}

/// A single search hit
#[derive(Debug, Clone, Default)]
pub struct VectorMatch {
    pub score: f32,
    /// String-valued payload fields
    pub payload: HashMap<String, String>,
}

/// Qdrant-backed similarity index
pub struct VectorStore {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStore {
    pub fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Fail early when the collection is missing
    pub async fn check_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if !exists {
            return Err(RagError::VectorStore(format!(
                "collection '{}' does not exist",
                self.config.collection
            )));
        }
        Ok(())
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }
}

#[async_trait]
impl SimilarityIndex for VectorStore {
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, RagError> {
        let request =
            SearchPointsBuilder::new(&self.config.collection, embedding.to_vec(), top_k as u64)
                .with_payload(true);

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point
                    .payload
                    .into_iter()
                    .filter_map(|(k, v)| match v.kind {
                        Some(Kind::StringValue(s)) => Some((k, s)),
                        _ => None,
                    })
                    .collect();

                VectorMatch {
                    score: point.score,
                    payload,
                }
            })
            .collect();

        Ok(matches)
    }
}
