//! Vector stores and the retriever built on top of them.

mod chroma;
pub mod mmr;
mod retriever;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::rchain::documents::Document;
use crate::rchain::embeddings::EmbeddingError;

pub use chroma::{Chroma, ChromaServer};
pub use retriever::{SearchType, VectorStoreRetriever};

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("chroma error: {0}")]
    Chroma(String),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("Vector store {0} does not exist.")]
    NotFound(String),
    #[error("malformed query result: {0}")]
    Malformed(String),
}

/// Distance function the collection index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    L2,
    Cosine,
    InnerProduct,
}

impl DistanceMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "ip",
        }
    }

    /// Maps a raw distance onto a relevance score where higher is closer.
    pub fn relevance(self, distance: f32) -> f32 {
        match self {
            Self::L2 => 1.0 - distance / std::f32::consts::SQRT_2,
            Self::Cosine => 1.0 - distance,
            Self::InnerProduct if distance > 0.0 => 1.0 - distance,
            Self::InnerProduct => -distance,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: Document,
    pub distance: f32,
    /// Present only when the query asked for stored vectors.
    pub embedding: Option<Vec<f32>>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn distance_metric(&self) -> DistanceMetric;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, VectorStoreError>;

    /// Returns up to `k` hits ordered by ascending distance.
    async fn search_by_vector(
        &self,
        embedding: Vec<f32>,
        k: usize,
        include_embeddings: bool,
    ) -> Result<Vec<SearchHit>, VectorStoreError>;

    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Document, f32)>, VectorStoreError> {
        let embedding = self.embed_query(query).await?;
        let hits = self.search_by_vector(embedding, k, false).await?;
        Ok(hits.into_iter().map(|hit| (hit.document, hit.distance)).collect())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let scored = self.similarity_search_with_score(query, k).await?;
        Ok(scored.into_iter().map(|(document, _)| document).collect())
    }

    async fn similarity_search_with_relevance_scores(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Document, f32)>, VectorStoreError> {
        let metric = self.distance_metric();
        let scored = self.similarity_search_with_score(query, k).await?;
        let relevant = scored
            .into_iter()
            .map(|(document, distance)| (document, metric.relevance(distance)))
            .collect::<Vec<_>>();
        if relevant
            .iter()
            .any(|(_, score)| !(0.0..=1.0).contains(score))
        {
            warn!(%metric, "Relevance scores must be between 0 and 1");
        }
        Ok(relevant)
    }

    /// Fetches `fetch_k` candidates and picks `k` of them balancing
    /// similarity to the query against similarity to each other.
    async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let embedding = self.embed_query(query).await?;
        let hits = self
            .search_by_vector(embedding.clone(), fetch_k, true)
            .await?;
        let candidates = hits
            .iter()
            .map(|hit| hit.embedding.clone().unwrap_or_default())
            .collect::<Vec<_>>();
        let selected = mmr::maximal_marginal_relevance(&embedding, &candidates, lambda_mult, k);

        let mut hits = hits.into_iter().map(Some).collect::<Vec<_>>();
        Ok(selected
            .into_iter()
            .filter_map(|index| hits.get_mut(index).and_then(Option::take))
            .map(|hit| hit.document)
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Brute-force store over fixed vectors; queries embed by keyword lookup.
    pub(crate) struct FixedStore {
        pub entries: Vec<(Document, Vec<f32>)>,
        pub queries: Vec<(&'static str, Vec<f32>)>,
    }

    fn l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        fn distance_metric(&self) -> DistanceMetric {
            DistanceMetric::L2
        }

        async fn embed_query(&self, query: &str) -> Result<Vec<f32>, VectorStoreError> {
            self.queries
                .iter()
                .find(|(text, _)| *text == query)
                .map(|(_, vector)| vector.clone())
                .ok_or_else(|| VectorStoreError::Malformed(format!("unknown query {query}")))
        }

        async fn search_by_vector(
            &self,
            embedding: Vec<f32>,
            k: usize,
            include_embeddings: bool,
        ) -> Result<Vec<SearchHit>, VectorStoreError> {
            let mut hits = self
                .entries
                .iter()
                .map(|(document, vector)| SearchHit {
                    document: document.clone(),
                    distance: l2(&embedding, vector),
                    embedding: include_embeddings.then(|| vector.clone()),
                })
                .collect::<Vec<_>>();
            hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            hits.truncate(k);
            Ok(hits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FixedStore;
    use super::*;

    fn store() -> FixedStore {
        FixedStore {
            entries: vec![
                (Document::new("Penelope waits"), vec![1.0, 0.0]),
                (Document::new("Penelope weaves"), vec![0.99, 0.1]),
                (Document::new("Cyclops"), vec![0.0, 1.0]),
            ],
            queries: vec![("wife", vec![1.0, 0.0])],
        }
    }

    #[test]
    fn relevance_functions_match_metric() {
        assert_eq!(DistanceMetric::L2.relevance(0.0), 1.0);
        assert!((DistanceMetric::L2.relevance(std::f32::consts::SQRT_2)).abs() < 1e-6);
        assert_eq!(DistanceMetric::Cosine.relevance(0.25), 0.75);
        assert_eq!(DistanceMetric::InnerProduct.relevance(-0.5), 0.5);
        assert_eq!(DistanceMetric::InnerProduct.relevance(0.25), 0.75);
    }

    #[tokio::test]
    async fn similarity_search_orders_by_distance() {
        let docs = store().similarity_search("wife", 2).await.unwrap();
        let texts = docs.iter().map(|doc| doc.page_content.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Penelope waits", "Penelope weaves"]);
    }

    #[tokio::test]
    async fn relevance_scores_are_derived_from_distance() {
        let scored = store()
            .similarity_search_with_relevance_scores("wife", 3)
            .await
            .unwrap();
        assert_eq!(scored[0].1, 1.0);
        assert!(scored[2].1 < 0.1);
    }

    #[tokio::test]
    async fn mmr_prefers_diverse_results() {
        let docs = store()
            .max_marginal_relevance_search("wife", 2, 3, 0.25)
            .await
            .unwrap();
        let texts = docs.iter().map(|doc| doc.page_content.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Penelope waits", "Cyclops"]);
    }
}
