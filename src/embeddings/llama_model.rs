// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GGUF embedding model via llama.cpp
//!
//! Loads a quantized GGUF embedding model (nomic-embed, bge, e5, ...) once and
//! shares its weights. Every `embed_raw` call creates its own llama context,
//! so concurrent queries never share mutable inference state.
//!
//! Output shapes:
//! - models with a pooling head return one sequence embedding (`Pooled`)
//! - models without one return per-token embeddings (`TokenLevel`), which
//!   the backend adapter mean-pools

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use tracing::{debug, info};

use super::backend::{sanitize_text, EmbeddingBackend, ModelHandle, RawEmbedding};
use super::config::EmbeddingModelConfig;
use super::loader::ModelLoader;
use crate::rag::errors::{Result, RetrievalError};

/// llama.cpp allows a single backend initialization per process
static LLAMA_BACKEND: OnceLock<std::result::Result<Arc<LlamaBackend>, String>> = OnceLock::new();

fn llama_backend() -> anyhow::Result<Arc<LlamaBackend>> {
    LLAMA_BACKEND
        .get_or_init(|| {
            LlamaBackend::init()
                .map(Arc::new)
                .map_err(|e| format!("{:?}", e))
        })
        .clone()
        .map_err(|e| anyhow!("Failed to initialize llama backend: {}", e))
}

/// GGUF embedding model loaded through llama.cpp
pub struct GgufEmbeddingModel {
    backend: Arc<LlamaBackend>,
    model: LlamaModel,
    model_name: String,
    dimension: usize,
    context_size: usize,
    threads: usize,
}

impl std::fmt::Debug for GgufEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GgufEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("context_size", &self.context_size)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl GgufEmbeddingModel {
    /// Loads the model weights from `model_path` (blocking, seconds-scale)
    pub fn load(model_path: &Path, params: GgufLoadParams) -> anyhow::Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("GGUF model file not found: {}", model_path.display());
        }

        let backend = llama_backend()?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(params.gpu_layers);

        info!("Loading GGUF embedding model from {}", model_path.display());
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| anyhow!("Failed to load model: {:?}", e))?;

        let dimension = usize::try_from(model.n_embd())
            .ok()
            .filter(|d| *d > 0)
            .context("Model reports no embedding dimension")?;

        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("gguf-embedding")
            .to_string();

        info!(
            "GGUF embedding model loaded: {} ({} dimensions)",
            model_name, dimension
        );

        Ok(Self {
            backend,
            model,
            model_name,
            dimension,
            context_size: params.context_size,
            threads: params.threads,
        })
    }

    fn run(&self, text: &str) -> anyhow::Result<RawEmbedding> {
        let sanitized = sanitize_text(text);
        let mut tokens = self
            .model
            .str_to_token(&sanitized, AddBos::Always)
            .map_err(|e| anyhow!("Failed to tokenize: {:?}", e))?;

        if tokens.is_empty() {
            anyhow::bail!("Text produced no tokens");
        }
        if tokens.len() > self.context_size {
            debug!(
                "Truncating query from {} to {} tokens",
                tokens.len(),
                self.context_size
            );
            tokens.truncate(self.context_size);
        }

        let n_tokens = tokens.len();
        let threads = i32::try_from(self.threads).unwrap_or(i32::MAX);
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_size as u32))
            .with_n_batch(self.context_size as u32)
            .with_n_ubatch(self.context_size as u32)
            .with_n_threads(threads)
            .with_n_threads_batch(threads)
            .with_embeddings(true);

        // Per-call context over the shared weights
        let mut context = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| anyhow!("Failed to create context: {:?}", e))?;

        let mut batch = LlamaBatch::new(n_tokens, 1);
        for (i, &token) in tokens.iter().enumerate() {
            batch
                .add(token, i as i32, &[0], true)
                .map_err(|e| anyhow!("Failed to add token to batch: {:?}", e))?;
        }

        context
            .decode(&mut batch)
            .map_err(|e| anyhow!("Decode failed: {:?}", e))?;

        if let Ok(pooled) = context.embeddings_seq_ith(0) {
            return Ok(RawEmbedding::Pooled(pooled.to_vec()));
        }

        // No pooling head: collect per-token rows
        let mut values = Vec::with_capacity(n_tokens * self.dimension);
        for i in 0..n_tokens {
            let row = context
                .embeddings_ith(i as i32)
                .map_err(|e| anyhow!("Failed to read token embedding {}: {:?}", i, e))?;
            values.extend_from_slice(row);
        }

        Ok(RawEmbedding::TokenLevel {
            values,
            tokens: n_tokens,
            hidden: self.dimension,
            attention_mask: vec![1; n_tokens],
        })
    }
}

impl EmbeddingBackend for GgufEmbeddingModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_raw(&self, text: &str) -> Result<RawEmbedding> {
        self.run(text)
            .map_err(|e| RetrievalError::Embedding(format!("{:#}", e)))
    }
}

/// Settings applied when loading a GGUF model and creating its contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufLoadParams {
    pub gpu_layers: u32,
    /// Context window; longer queries are truncated
    pub context_size: usize,
    /// llama.cpp threads per inference call
    pub threads: usize,
}

impl From<&EmbeddingModelConfig> for GgufLoadParams {
    fn from(config: &EmbeddingModelConfig) -> Self {
        Self {
            gpu_layers: config.gpu_layers,
            context_size: config.context_size,
            threads: config.threads,
        }
    }
}

/// Loads GGUF models on the blocking pool
#[derive(Debug, Clone)]
pub struct GgufModelLoader {
    params: GgufLoadParams,
}

impl GgufModelLoader {
    pub fn new(config: &EmbeddingModelConfig) -> Self {
        Self {
            params: GgufLoadParams::from(config),
        }
    }

    pub fn params(&self) -> GgufLoadParams {
        self.params
    }
}

#[async_trait]
impl ModelLoader for GgufModelLoader {
    async fn load(&self, path: &Path) -> Result<ModelHandle> {
        let path: PathBuf = path.to_path_buf();
        let display = path.display().to_string();
        let params = self.params;

        let loaded = tokio::task::spawn_blocking(move || GgufEmbeddingModel::load(&path, params))
            .await
            .map_err(|e| RetrievalError::ModelLoad {
                path: display.clone(),
                reason: format!("load task failed: {}", e),
            })?;

        match loaded {
            Ok(model) => Ok(Arc::new(model) as ModelHandle),
            Err(e) => Err(RetrievalError::ModelLoad {
                path: display,
                reason: format!("{:#}", e),
            }),
        }
    }
}
