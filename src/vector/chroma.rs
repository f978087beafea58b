// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chroma-compatible HTTP vector store client
//!
//! Talks to the v1 REST API:
//! - `GET  /api/v1/heartbeat`
//! - `GET  /api/v1/collections/{name}?tenant=..&database=..`
//! - `POST /api/v1/collections/{id}/query`
//!
//! Query responses are batched: every field is a list with one row per query
//! embedding. Only one embedding is sent, so only row 0 is read.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::config::VectorStoreConfig;
use super::store::VectorStore;
use super::types::{CollectionHandle, ConnectionState, Document, Metadata, QueryResult};
use crate::embeddings::EmbeddingVector;
use crate::rag::errors::{Result, RetrievalError};

/// Negative distances down to this value are float noise and clamp to 0
const NEGATIVE_DISTANCE_TOLERANCE: f32 = -1e-3;

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

/// HTTP client for a Chroma-compatible vector store
pub struct ChromaClient {
    client: Client,
    base_url: Url,
    config: VectorStoreConfig,
    state: RwLock<ConnectionState>,
}

impl std::fmt::Debug for ChromaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromaClient")
            .field("base_url", &self.base_url.as_str())
            .field("tenant", &self.config.tenant)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl ChromaClient {
    /// Build a client without contacting the store (state starts disconnected)
    pub fn new(config: VectorStoreConfig) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        let base_url = config.base_url().map_err(RetrievalError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(config.query_timeout())
            .connect_timeout(config.health_timeout())
            .build()
            .map_err(|e| RetrievalError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            config,
            state: RwLock::new(ConnectionState::disconnected()),
        })
    }

    /// Build a client and run the startup heartbeat
    ///
    /// Fails with `Connection` when the store does not answer.
    pub async fn connect(config: VectorStoreConfig) -> Result<Self> {
        let store = Self::new(config)?;
        if store.health_check().await {
            info!("Connected to vector store at {}", store.endpoint());
            Ok(store)
        } else {
            let reason = store
                .state
                .read()
                .await
                .last_error
                .clone()
                .unwrap_or_else(|| "heartbeat failed".to_string());
            Err(RetrievalError::Connection {
                endpoint: store.endpoint().to_string(),
                reason,
            })
        }
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RetrievalError::InvalidConfig(format!(
                    "Endpoint cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key).header("x-chroma-token", key),
            None => request,
        }
    }

    fn transport_error(
        &self,
        operation: &'static str,
        timeout: Duration,
        err: reqwest::Error,
    ) -> RetrievalError {
        if err.is_timeout() {
            RetrievalError::Timeout {
                operation,
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            RetrievalError::Connection {
                endpoint: self.endpoint().to_string(),
                reason: err.to_string(),
            }
        }
    }

    async fn mark_disconnected(&self, err: &RetrievalError) {
        self.state.write().await.mark_disconnected(err.to_string());
    }

    async fn send(
        &self,
        operation: &'static str,
        timeout: Duration,
        request: RequestBuilder,
    ) -> Result<reqwest::Response> {
        match self.authorized(request).timeout(timeout).send().await {
            Ok(response) => Ok(response),
            Err(e) => {
                let err = self.transport_error(operation, timeout, e);
                self.mark_disconnected(&err).await;
                Err(err)
            }
        }
    }

    async fn heartbeat(&self) -> Result<()> {
        let url = self.url(&["heartbeat"])?;
        let timeout = self.config.health_timeout();
        let response = self
            .send("heartbeat", timeout, self.client.get(url))
            .await?;

        if !response.status().is_success() {
            return Err(RetrievalError::Connection {
                endpoint: self.endpoint().to_string(),
                reason: format!("heartbeat returned status {}", response.status()),
            });
        }
        Ok(())
    }
}

fn row<T>(batch: Option<Vec<Vec<T>>>) -> Option<Vec<T>> {
    batch.map(|rows| rows.into_iter().next().unwrap_or_default())
}

/// Zip the index-aligned response arrays into sorted results
fn collect_results(response: QueryResponse, candidate_count: usize) -> Result<Vec<QueryResult>> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = row(response.documents)
        .ok_or_else(|| RetrievalError::Query("response is missing documents".to_string()))?;
    let distances = row(response.distances)
        .ok_or_else(|| RetrievalError::Query("response is missing distances".to_string()))?;
    let metadatas = row(response.metadatas);

    if documents.len() != ids.len() || distances.len() != ids.len() {
        return Err(RetrievalError::Query(format!(
            "misaligned response arrays: {} ids, {} documents, {} distances",
            ids.len(),
            documents.len(),
            distances.len()
        )));
    }
    if let Some(metadatas) = &metadatas {
        if metadatas.len() != ids.len() {
            return Err(RetrievalError::Query(format!(
                "misaligned response arrays: {} ids, {} metadatas",
                ids.len(),
                metadatas.len()
            )));
        }
    }

    let mut metadatas = metadatas.map(|m| m.into_iter());
    let mut results = Vec::with_capacity(ids.len());
    for ((id, text), distance) in ids.into_iter().zip(documents).zip(distances) {
        let metadata = metadatas.as_mut().and_then(|m| m.next()).flatten();

        let distance = match distance {
            Some(d) if d.is_finite() && d >= 0.0 => d,
            Some(d) if d.is_finite() && d >= NEGATIVE_DISTANCE_TOLERANCE => 0.0,
            other => {
                return Err(RetrievalError::Query(format!(
                    "invalid distance {:?} for document {}",
                    other, id
                )))
            }
        };

        let Some(text) = text else {
            debug!("Skipping document {} without stored text", id);
            continue;
        };

        results.push(QueryResult::new(
            Document {
                id,
                text,
                metadata,
            },
            distance,
        ));
    }

    // Ascending even if the store returns another order
    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results.truncate(candidate_count);
    Ok(results)
}

#[async_trait]
impl VectorStore for ChromaClient {
    fn endpoint(&self) -> String {
        self.base_url.to_string()
    }

    async fn health_check(&self) -> bool {
        match self.heartbeat().await {
            Ok(()) => {
                self.state.write().await.mark_connected();
                debug!("Vector store heartbeat ok: {}", self.endpoint());
                true
            }
            Err(e) => {
                warn!(
                    stage = "connect",
                    endpoint = %self.base_url,
                    error = %e,
                    "Vector store health check failed"
                );
                self.mark_disconnected(&e).await;
                false
            }
        }
    }

    async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected()
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle> {
        let url = self.url(&["collections", name])?;
        let request = self.client.get(url).query(&[
            ("tenant", self.config.tenant.as_str()),
            ("database", self.config.database.as_str()),
        ]);
        let response = self
            .send("get_collection", self.config.query_timeout(), request)
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RetrievalError::CollectionNotFound(name.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Older servers report a missing collection as a 500 with this text
            if body.contains("does not exist") {
                return Err(RetrievalError::CollectionNotFound(name.to_string()));
            }
            return Err(RetrievalError::Query(format!(
                "collection lookup returned status {}: {}",
                status, body
            )));
        }

        let collection: CollectionResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Query(format!("invalid collection response: {}", e)))?;

        debug!(
            "Resolved collection {} -> {} (dimension {:?})",
            collection.name, collection.id, collection.dimension
        );

        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
            metadata: collection.metadata,
            dimension: collection.dimension,
        })
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &EmbeddingVector,
        candidate_count: usize,
    ) -> Result<Vec<QueryResult>> {
        if let Some(expected) = collection.dimension {
            if expected != vector.dimension() {
                return Err(RetrievalError::DimensionMismatch {
                    expected,
                    actual: vector.dimension(),
                });
            }
        }
        if candidate_count == 0 {
            return Ok(Vec::new());
        }

        let url = self.url(&["collections", collection.id.as_str(), "query"])?;
        let body = QueryRequest {
            query_embeddings: [vector.as_slice()],
            n_results: candidate_count,
            include: ["documents", "metadatas", "distances"],
        };
        let response = self
            .send("query", self.config.query_timeout(), self.client.post(url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Query(format!(
                "query returned status {}: {}",
                status, body
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Query(format!("invalid query response: {}", e)))?;

        let results = collect_results(parsed, candidate_count)?;
        debug!(
            collection = %collection.name,
            candidates = results.len(),
            "Vector store query complete"
        );
        Ok(results)
    }
}
