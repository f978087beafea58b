// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding model lifecycle
//!
//! [`SharedModel`] owns the single model handle used by the retrieval
//! pipeline. Loading is lazy and single-flight: concurrent callers wait on
//! the same load instead of loading the weights twice. `init` loads eagerly
//! so a broken model path is reported once at startup, and `dispose`
//! releases the weights at shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::backend::ModelHandle;
use super::config::EmbeddingModelConfig;
use crate::rag::errors::{Result, RetrievalError};

/// Turns a model file into a loaded handle
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Loads the model at `path`; fails with `RetrievalError::ModelLoad`
    async fn load(&self, path: &Path) -> Result<ModelHandle>;
}

/// Picks the loader matching the configured backend
pub fn loader_for(config: &EmbeddingModelConfig) -> Result<Arc<dyn ModelLoader>> {
    match config.backend {
        #[cfg(feature = "llama")]
        super::config::ModelBackend::Gguf => {
            Ok(Arc::new(super::llama_model::GgufModelLoader::new(config)))
        }
        #[cfg(feature = "onnx")]
        super::config::ModelBackend::Onnx => {
            Ok(Arc::new(super::onnx_model::OnnxModelLoader::new(config)))
        }
        #[allow(unreachable_patterns)]
        other => Err(RetrievalError::InvalidConfig(format!(
            "{:?} backend not compiled in (enable the matching cargo feature)",
            other
        ))),
    }
}

enum ModelSlot {
    Unloaded,
    Ready(ModelHandle),
    /// Last load failed; kept so per-query calls don't retry a slow load
    Failed(String),
    Disposed,
}

/// Process-lifetime owner of the embedding model handle
pub struct SharedModel {
    path: PathBuf,
    loader: Arc<dyn ModelLoader>,
    slot: Mutex<ModelSlot>,
}

impl std::fmt::Debug for SharedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedModel")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SharedModel {
    pub fn new(path: impl Into<PathBuf>, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            path: path.into(),
            loader,
            slot: Mutex::new(ModelSlot::Unloaded),
        }
    }

    /// Builds the model owner from configuration (model not loaded yet)
    pub fn from_config(config: &EmbeddingModelConfig) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        let loader = loader_for(config)?;
        Ok(Self::new(config.resolved_model_path(), loader))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the model now, retrying a previously failed or disposed model
    pub async fn init(&self) -> Result<ModelHandle> {
        let mut slot = self.slot.lock().await;
        if let ModelSlot::Ready(handle) = &*slot {
            return Ok(Arc::clone(handle));
        }
        self.load_into(&mut slot).await
    }

    /// Returns the loaded model, loading it on first use
    ///
    /// After a failed load the cached failure is returned without reloading;
    /// after `dispose` the model is `NotReady` until `init` is called again.
    pub async fn get_or_load(&self) -> Result<ModelHandle> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            ModelSlot::Ready(handle) => Ok(Arc::clone(handle)),
            ModelSlot::Failed(reason) => Err(RetrievalError::ModelLoad {
                path: self.path.display().to_string(),
                reason: reason.clone(),
            }),
            ModelSlot::Disposed => Err(RetrievalError::NotReady),
            ModelSlot::Unloaded => self.load_into(&mut slot).await,
        }
    }

    /// Returns the model only if it is already loaded
    pub async fn current(&self) -> Result<ModelHandle> {
        match &*self.slot.lock().await {
            ModelSlot::Ready(handle) => Ok(Arc::clone(handle)),
            _ => Err(RetrievalError::NotReady),
        }
    }

    /// Releases the model weights; returns whether a model was loaded
    pub async fn dispose(&self) -> bool {
        let mut slot = self.slot.lock().await;
        let was_loaded = matches!(&*slot, ModelSlot::Ready(_));
        *slot = ModelSlot::Disposed;
        if was_loaded {
            info!("Embedding model released: {}", self.path.display());
        }
        was_loaded
    }

    pub async fn is_loaded(&self) -> bool {
        matches!(&*self.slot.lock().await, ModelSlot::Ready(_))
    }

    async fn load_into(&self, slot: &mut ModelSlot) -> Result<ModelHandle> {
        if !self.path.exists() {
            let reason = "model file not found".to_string();
            *slot = ModelSlot::Failed(reason.clone());
            return Err(RetrievalError::ModelLoad {
                path: self.path.display().to_string(),
                reason,
            });
        }

        debug!("Loading embedding model from {}", self.path.display());
        match self.loader.load(&self.path).await {
            Ok(handle) => {
                info!(
                    "Embedding model ready: {} ({} dimensions)",
                    handle.model_name(),
                    handle.dimension()
                );
                *slot = ModelSlot::Ready(Arc::clone(&handle));
                Ok(handle)
            }
            Err(err) => {
                let reason = match &err {
                    RetrievalError::ModelLoad { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                *slot = ModelSlot::Failed(reason);
                Err(err)
            }
        }
    }
}
