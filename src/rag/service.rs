// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval service orchestration
//!
//! Coordinates the embedding model, the vector store and relevance filtering
//! behind a single `retrieve(query)` call. Retrieval is best effort: any
//! failure yields an empty result so the conversation continues without
//! context, and each failed call produces exactly one warning.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::config::{RagConfig, RetrievalConfig};
use super::errors::{Result, RetrievalError};
use super::filter::RelevanceFilter;
use crate::embeddings::{QueryEmbedder, SharedModel};
use crate::vector::{ChromaClient, ConnectionState, Document, QueryResult, VectorStore};

/// Pipeline failure, flagged when the failing stage already logged it
struct StageFailure {
    error: RetrievalError,
    reported: bool,
}

impl From<RetrievalError> for StageFailure {
    fn from(error: RetrievalError) -> Self {
        Self {
            error,
            reported: false,
        }
    }
}

/// Facade over embedding, vector search and relevance filtering
pub struct RetrievalService {
    model: Arc<SharedModel>,
    embedder: QueryEmbedder,
    store: Arc<dyn VectorStore>,
    filter: RelevanceFilter,
    config: RetrievalConfig,
}

impl RetrievalService {
    /// Assemble a service from already constructed parts
    pub fn new(
        model: Arc<SharedModel>,
        embedder: QueryEmbedder,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(Self {
            model,
            embedder,
            store,
            filter: RelevanceFilter::from_config(&config),
            config,
        })
    }

    /// Build the service with a Chroma client and the configured model backend
    ///
    /// Nothing is loaded or contacted here; call `init` at startup.
    pub fn from_config(config: RagConfig) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;

        let model = Arc::new(SharedModel::from_config(&config.embedding)?);
        let embedder = QueryEmbedder::from_config(Arc::clone(&model), &config.embedding);
        let store: Arc<dyn VectorStore> = Arc::new(ChromaClient::new(config.vector_store)?);

        Self::new(model, embedder, store, config.retrieval)
    }

    /// Load the model and probe the store
    ///
    /// Only a model load failure is returned; an unreachable store is
    /// recorded in the connection state and retried on later calls.
    pub async fn init(&self) -> Result<()> {
        if let Err(e) = self.model.init().await {
            error!(
                stage = %e.stage(),
                error = %e,
                hint = %e.user_message(),
                "Embedding model failed to load"
            );
            return Err(e);
        }

        if self.store.health_check().await {
            info!(
                "Retrieval ready (collection '{}', threshold {})",
                self.config.collection_name, self.config.threshold_distance
            );
        }
        Ok(())
    }

    /// Release the model; later retrievals return nothing until `init`
    pub async fn dispose(&self) -> bool {
        self.model.dispose().await
    }

    /// Probe the store again and refresh the connection state
    pub async fn reconnect(&self) -> bool {
        self.store.health_check().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.store.connection_state().await
    }

    pub async fn is_ready(&self) -> bool {
        self.model.is_loaded().await
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Texts of the documents relevant to `query`, most similar first
    ///
    /// Never fails: on any error the result is empty.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        self.retrieve_documents(query)
            .await
            .into_iter()
            .map(|doc| doc.text)
            .collect()
    }

    /// Like `retrieve`, keeping ids and metadata
    pub async fn retrieve_documents(&self, query: &str) -> Vec<Document> {
        self.retrieve_with_scores(query)
            .await
            .into_iter()
            .map(|result| result.document)
            .collect()
    }

    /// Like `retrieve`, keeping distances
    pub async fn retrieve_with_scores(&self, query: &str) -> Vec<QueryResult> {
        let request_id = Uuid::new_v4();
        let span = info_span!("retrieve", %request_id);

        async {
            if query.trim().is_empty() {
                debug!("Empty query, skipping retrieval");
                return Vec::new();
            }

            match self.run(query).await {
                Ok(results) => results,
                Err(failure) if failure.reported => {
                    debug!(error = %failure.error, "Retrieval skipped");
                    Vec::new()
                }
                Err(failure) => {
                    let e = failure.error;
                    warn!(
                        stage = %e.stage(),
                        code = e.error_code(),
                        transient = e.is_transient(),
                        error = %e,
                        "Retrieval failed, continuing without context"
                    );
                    Vec::new()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline and return the error instead of an empty result
    pub async fn try_retrieve(&self, query: &str) -> Result<Vec<QueryResult>> {
        self.run(query).await.map_err(|failure| failure.error)
    }

    async fn run(&self, query: &str) -> std::result::Result<Vec<QueryResult>, StageFailure> {
        let start = Instant::now();

        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyInput.into());
        }
        self.model.get_or_load().await?;
        let vector = self.embedder.embed(query).await?;

        let reachable = if self.config.probe_before_query {
            self.store.health_check().await
        } else {
            self.store.is_connected().await
        };
        if !reachable {
            let state = self.store.connection_state().await;
            return Err(StageFailure {
                error: RetrievalError::Connection {
                    endpoint: self.store.endpoint(),
                    reason: state
                        .last_error
                        .unwrap_or_else(|| "not connected".to_string()),
                },
                // health_check logs its own failure
                reported: self.config.probe_before_query,
            });
        }

        let collection = self
            .store
            .get_collection(&self.config.collection_name)
            .await?;
        let candidates = self
            .store
            .query(&collection, &vector, self.config.candidate_count)
            .await?;
        let candidate_count = candidates.len();

        let accepted = self.filter.apply_with_scores(candidates);
        debug!(
            collection = %collection.name,
            candidates = candidate_count,
            accepted = accepted.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Retrieval complete"
        );
        Ok(accepted)
    }
}
