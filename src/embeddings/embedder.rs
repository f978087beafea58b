// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Query embedding
//!
//! Converts query text into an [`EmbeddingVector`] using the already loaded
//! shared model. Inference runs on the blocking pool; a semaphore bounds how
//! many embedding calls run at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use super::backend::ModelHandle;
use super::config::EmbeddingModelConfig;
use super::loader::SharedModel;
use super::vector::EmbeddingVector;
use crate::rag::errors::{Result, RetrievalError};

/// Embeds query strings with the shared model
#[derive(Debug, Clone)]
pub struct QueryEmbedder {
    model: Arc<SharedModel>,
    permits: Arc<Semaphore>,
    normalize: bool,
}

impl QueryEmbedder {
    pub fn new(model: Arc<SharedModel>, max_concurrent: usize, normalize: bool) -> Self {
        Self {
            model,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            normalize,
        }
    }

    pub fn from_config(model: Arc<SharedModel>, config: &EmbeddingModelConfig) -> Self {
        Self::new(model, config.max_concurrent_embeddings, config.normalize)
    }

    /// Embeds `text` into a vector of the model's dimension
    ///
    /// Fails with `EmptyInput` for blank text and `NotReady` when the model
    /// has not been loaded. Same model and same text give the same vector.
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        if text.trim().is_empty() {
            return Err(RetrievalError::EmptyInput);
        }
        let handle = self.model.current().await?;
        self.embed_with(handle, text).await
    }

    async fn embed_with(&self, handle: ModelHandle, text: &str) -> Result<EmbeddingVector> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RetrievalError::NotReady)?;

        let dimension = handle.dimension();
        let text = text.to_string();
        let raw = tokio::task::spawn_blocking(move || handle.embed_raw(&text))
            .await
            .map_err(|e| RetrievalError::Embedding(format!("embedding task failed: {}", e)))??;

        let vector = raw.into_vector(dimension)?;
        debug!("Embedded query into {} dimensions", vector.dimension());

        Ok(if self.normalize {
            vector.l2_normalized()
        } else {
            vector
        })
    }
}
