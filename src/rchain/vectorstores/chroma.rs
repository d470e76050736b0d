use async_trait::async_trait;
use chromadb::client::{ChromaClient, ChromaClientOptions};
use chromadb::collection::{ChromaCollection, CollectionEntries, QueryOptions, QueryResult};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DistanceMetric, SearchHit, VectorStore, VectorStoreError};
use crate::rchain::documents::Document;
use crate::rchain::embeddings::Embeddings;

/// Documents per upsert request.
const UPSERT_BATCH: usize = 100;

fn chroma_err(err: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Chroma(err.to_string())
}

/// Connection to a Chroma server; each named store is one collection.
pub struct ChromaServer {
    client: ChromaClient,
    url: String,
}

impl ChromaServer {
    pub async fn connect(url: &str) -> Result<Self, VectorStoreError> {
        let options = ChromaClientOptions {
            url: Some(url.to_string()),
            ..Default::default()
        };
        let client = ChromaClient::new(options).await.map_err(chroma_err)?;
        debug!(url, "connected to chroma");
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        let collections = self.client.list_collections().await.map_err(chroma_err)?;
        Ok(collections.iter().any(|collection| collection.name() == name))
    }

    /// Embeds `documents` and stores them in a new or existing collection.
    pub async fn from_documents<E: Embeddings>(
        &self,
        name: &str,
        documents: &[Document],
        embeddings: E,
    ) -> Result<Chroma<E>, VectorStoreError> {
        let metric = DistanceMetric::default();
        let mut metadata = Map::new();
        metadata.insert("hnsw:space".to_string(), json!(metric.as_str()));
        let collection = self
            .client
            .get_or_create_collection(name, Some(metadata))
            .await
            .map_err(chroma_err)?;
        let store = Chroma {
            name: name.to_string(),
            collection,
            embeddings,
            metric,
        };
        store.add_documents(documents).await?;
        Ok(store)
    }

    /// Opens an existing collection for querying.
    pub async fn open<E: Embeddings>(
        &self,
        name: &str,
        embeddings: E,
    ) -> Result<Chroma<E>, VectorStoreError> {
        if !self.exists(name).await? {
            return Err(VectorStoreError::NotFound(name.to_string()));
        }
        let collection = self.client.get_collection(name).await.map_err(chroma_err)?;
        let metric = collection_metric(collection.metadata());
        debug!(collection = name, %metric, "opened collection");
        Ok(Chroma {
            name: name.to_string(),
            collection,
            embeddings,
            metric,
        })
    }
}

/// A Chroma collection paired with the embedding model that filled it.
pub struct Chroma<E> {
    name: String,
    collection: ChromaCollection,
    embeddings: E,
    metric: DistanceMetric,
}

impl<E: Embeddings> Chroma<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_documents(&self, documents: &[Document]) -> Result<Vec<String>, VectorStoreError> {
        let texts = documents
            .iter()
            .map(|document| document.page_content.clone())
            .collect::<Vec<_>>();
        let vectors = self.embeddings.embed_documents(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(VectorStoreError::Malformed(format!(
                "{} embeddings for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        let ids = documents
            .iter()
            .map(|_| Uuid::new_v4().to_string())
            .collect::<Vec<_>>();
        let mut rows = documents.iter().zip(vectors).zip(&ids).collect::<Vec<_>>();
        // Chroma rejects empty metadata maps mixed into a batch that has some.
        rows.sort_by_key(|((document, _), _)| document.metadata.is_empty());

        for group in rows.chunk_by(|a, b| a.0.0.metadata.is_empty() == b.0.0.metadata.is_empty()) {
            for batch in group.chunks(UPSERT_BATCH) {
                let with_metadata = !batch[0].0.0.metadata.is_empty();
                let entries = CollectionEntries {
                    ids: batch.iter().map(|(_, id)| id.as_str()).collect(),
                    metadatas: with_metadata.then(|| {
                        batch
                            .iter()
                            .map(|((document, _), _)| document.metadata.clone())
                            .collect()
                    }),
                    documents: Some(
                        batch
                            .iter()
                            .map(|((document, _), _)| document.page_content.as_str())
                            .collect(),
                    ),
                    embeddings: Some(batch.iter().map(|((_, vector), _)| vector.clone()).collect()),
                };
                self.collection.upsert(entries, None).await.map_err(chroma_err)?;
                debug!(collection = %self.name, batch = batch.len(), "upserted documents");
            }
        }
        info!(collection = %self.name, documents = documents.len(), "stored documents");
        Ok(ids)
    }

    pub fn as_retriever(self, search: super::SearchType) -> super::VectorStoreRetriever<Self> {
        super::VectorStoreRetriever::new(self, search)
    }
}

#[async_trait]
impl<E: Embeddings> VectorStore for Chroma<E> {
    fn distance_metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, VectorStoreError> {
        Ok(self.embeddings.embed_query(query).await?)
    }

    async fn search_by_vector(
        &self,
        embedding: Vec<f32>,
        k: usize,
        include_embeddings: bool,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let mut include = vec!["documents", "metadatas", "distances"];
        if include_embeddings {
            include.push("embeddings");
        }
        let options = QueryOptions {
            query_texts: None,
            query_embeddings: Some(vec![embedding]),
            where_metadata: None,
            where_document: None,
            n_results: Some(k),
            include: Some(include),
        };
        let result = self.collection.query(options, None).await.map_err(chroma_err)?;
        parse_query_result(result)
    }
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Vec<T> {
    rows.and_then(|rows| rows.into_iter().next()).unwrap_or_default()
}

/// Reads the first query row of a Chroma result into hits.
pub(crate) fn parse_query_result(result: QueryResult) -> Result<Vec<SearchHit>, VectorStoreError> {
    let ids = first_row(Some(result.ids));
    let mut documents = first_row(result.documents).into_iter();
    let mut metadatas = first_row(result.metadatas).into_iter();
    let mut distances = first_row(result.distances).into_iter();
    let mut embeddings = first_row(result.embeddings).into_iter();

    ids.iter()
        .map(|id| {
            let distance = distances
                .next()
                .ok_or_else(|| VectorStoreError::Malformed(format!("missing distance for {id}")))?;
            Ok(SearchHit {
                document: Document {
                    page_content: documents.next().unwrap_or_default(),
                    metadata: metadatas.next().flatten().unwrap_or_default(),
                },
                distance,
                embedding: embeddings.next(),
            })
        })
        .collect()
}

/// Metric recorded under `hnsw:space` at creation; Chroma defaults to l2.
fn collection_metric(metadata: Option<&Map<String, Value>>) -> DistanceMetric {
    let space = metadata
        .and_then(|metadata| metadata.get("hnsw:space"))
        .and_then(Value::as_str);
    match space {
        Some("cosine") => DistanceMetric::Cosine,
        Some("ip") => DistanceMetric::InnerProduct,
        Some("l2") | None => DistanceMetric::L2,
        Some(other) => {
            warn!(space = other, "unknown distance metric, assuming l2");
            DistanceMetric::L2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_result(ids: &[&str]) -> QueryResult {
        QueryResult {
            ids: vec![ids.iter().map(|id| id.to_string()).collect()],
            metadatas: None,
            documents: None,
            embeddings: None,
            distances: None,
        }
    }

    #[test]
    fn reads_first_query_row() {
        let mut source = Map::new();
        source.insert("source".to_string(), json!("odyssey.txt"));
        let result = QueryResult {
            metadatas: Some(vec![vec![Some(source), None]]),
            documents: Some(vec![vec!["Penelope".to_string(), "Telemachus".to_string()]]),
            distances: Some(vec![vec![0.25, 0.5]]),
            ..query_result(&["a", "b"])
        };

        let hits = parse_query_result(result).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.page_content, "Penelope");
        assert_eq!(hits[0].document.source(), Some("odyssey.txt"));
        assert!(hits[1].document.metadata.is_empty());
        assert_eq!(hits[1].distance, 0.5);
        assert!(hits[0].embedding.is_none());
    }

    #[test]
    fn keeps_stored_vectors_when_requested() {
        let result = QueryResult {
            distances: Some(vec![vec![0.1]]),
            embeddings: Some(vec![vec![vec![1.0, 0.0]]]),
            ..query_result(&["a"])
        };
        let hits = parse_query_result(result).unwrap();
        assert_eq!(hits[0].embedding.as_deref(), Some(&[1.0, 0.0][..]));
        assert_eq!(hits[0].document.page_content, "");
    }

    #[test]
    fn missing_distance_is_malformed() {
        let result = QueryResult {
            documents: Some(vec![vec!["x".to_string()]]),
            ..query_result(&["a"])
        };
        assert!(matches!(
            parse_query_result(result),
            Err(VectorStoreError::Malformed(_))
        ));
    }

    #[test]
    fn empty_result_has_no_hits() {
        assert!(parse_query_result(query_result(&[])).unwrap().is_empty());

        let no_rows = QueryResult {
            ids: Vec::new(),
            distances: Some(Vec::new()),
            ..query_result(&[])
        };
        assert!(parse_query_result(no_rows).unwrap().is_empty());
    }

    #[test]
    fn metric_follows_collection_space() {
        let mut metadata = Map::new();
        assert_eq!(collection_metric(None), DistanceMetric::L2);
        assert_eq!(collection_metric(Some(&metadata)), DistanceMetric::L2);

        metadata.insert("hnsw:space".to_string(), json!("cosine"));
        assert_eq!(collection_metric(Some(&metadata)), DistanceMetric::Cosine);
        metadata.insert("hnsw:space".to_string(), json!("ip"));
        assert_eq!(collection_metric(Some(&metadata)), DistanceMetric::InnerProduct);
        metadata.insert("hnsw:space".to_string(), json!("manhattan"));
        assert_eq!(collection_metric(Some(&metadata)), DistanceMetric::L2);
    }

    #[test]
    fn missing_store_names_the_collection() {
        let err = VectorStoreError::NotFound("chroma_db_with_metadata".to_string());
        assert_eq!(
            err.to_string(),
            "Vector store chroma_db_with_metadata does not exist."
        );
    }
}
