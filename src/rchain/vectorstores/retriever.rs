use async_trait::async_trait;
use tracing::{debug, warn};

use super::{VectorStore, VectorStoreError};
use crate::rchain::documents::Document;
use crate::rchain::runnables::{ChainError, Runnable};

/// How a retriever selects documents from its store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchType {
    Similarity {
        k: usize,
    },
    Mmr {
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    },
    SimilarityScoreThreshold {
        k: usize,
        score_threshold: f32,
    },
}

impl SearchType {
    pub const DEFAULT_K: usize = 4;
    pub const DEFAULT_FETCH_K: usize = 20;
    pub const DEFAULT_LAMBDA_MULT: f32 = 0.5;

    pub fn similarity(k: usize) -> Self {
        Self::Similarity { k }
    }

    /// MMR with the default candidate pool and diversity weight.
    pub fn mmr(k: usize) -> Self {
        Self::Mmr {
            k,
            fetch_k: Self::DEFAULT_FETCH_K,
            lambda_mult: Self::DEFAULT_LAMBDA_MULT,
        }
    }

    pub fn score_threshold(k: usize, score_threshold: f32) -> Self {
        Self::SimilarityScoreThreshold { k, score_threshold }
    }
}

impl Default for SearchType {
    fn default() -> Self {
        Self::similarity(Self::DEFAULT_K)
    }
}

pub struct VectorStoreRetriever<S> {
    store: S,
    search: SearchType,
}

impl<S: VectorStore> VectorStoreRetriever<S> {
    pub fn new(store: S, search: SearchType) -> Self {
        Self { store, search }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, VectorStoreError> {
        debug!(search = ?self.search, query, "retrieving documents");
        match self.search {
            SearchType::Similarity { k } => self.store.similarity_search(query, k).await,
            SearchType::Mmr {
                k,
                fetch_k,
                lambda_mult,
            } => {
                self.store
                    .max_marginal_relevance_search(query, k, fetch_k, lambda_mult)
                    .await
            }
            SearchType::SimilarityScoreThreshold { k, score_threshold } => {
                let scored = self
                    .store
                    .similarity_search_with_relevance_scores(query, k)
                    .await?;
                let relevant = scored
                    .into_iter()
                    .filter(|(_, score)| *score >= score_threshold)
                    .map(|(document, _)| document)
                    .collect::<Vec<_>>();
                if relevant.is_empty() {
                    warn!(
                        score_threshold,
                        "No relevant docs were retrieved using the relevance score threshold"
                    );
                }
                Ok(relevant)
            }
        }
    }
}

#[async_trait]
impl<S: VectorStore> Runnable<String> for VectorStoreRetriever<S> {
    type Output = Vec<Document>;

    async fn invoke(&self, input: String) -> Result<Vec<Document>, ChainError> {
        Ok(self.retrieve(&input).await?)
    }
}
