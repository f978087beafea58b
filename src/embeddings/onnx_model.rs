// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX embedding model via ONNX Runtime
//!
//! Wraps a sentence-transformer export (e.g. all-MiniLM-L6-v2) plus its
//! HuggingFace tokenizer. ONNX sessions are not shared between concurrent
//! runs here: the session sits behind a mutex and calls are serialized.
//!
//! Exports differ in what they return:
//! - `[batch, seq_len, hidden]` token embeddings (mean pooled by the adapter)
//! - `[batch, hidden]` sentence embeddings
//! - `[hidden]` for some single-input exports
//!
//! The dimension is taken from a validation inference at load time.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::backend::{sanitize_text, EmbeddingBackend, ModelHandle, RawEmbedding};
use super::config::EmbeddingModelConfig;
use super::loader::ModelLoader;
use crate::rag::errors::RetrievalError;

/// ONNX-based embedding model
pub struct OnnxEmbeddingModel {
    /// ONNX Runtime session; `run` needs exclusive access
    session: Mutex<Session>,

    tokenizer: Tokenizer,

    model_name: String,

    /// Output dimension measured at load time
    dimension: usize,

    /// Maximum tokens per input; longer inputs are truncated
    max_length: usize,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl OnnxEmbeddingModel {
    /// Loads the ONNX model and tokenizer from disk (blocking)
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - The validation inference yields an unusable output shape
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        threads: usize,
        max_length: usize,
    ) -> Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("Loading ONNX embedding model from {}", model_path.display());
        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let model_name = model_path
            .parent()
            .and_then(|p| p.file_name())
            .or_else(|| model_path.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("onnx-embedding")
            .to_string();

        let mut model = Self {
            session: Mutex::new(session),
            tokenizer,
            model_name,
            dimension: 0,
            max_length,
        };

        // Measure the output dimension with a throwaway inference
        let probe = model.run("validation test")?;
        model.dimension = match &probe {
            RawEmbedding::Pooled(v) => v.len(),
            RawEmbedding::Batched(rows) => rows.first().map_or(0, Vec::len),
            RawEmbedding::TokenLevel { hidden, .. } => *hidden,
        };
        if model.dimension == 0 {
            anyhow::bail!("Model produced an empty embedding during validation");
        }

        info!(
            "ONNX embedding model loaded: {} ({} dimensions)",
            model.model_name, model.dimension
        );
        Ok(model)
    }

    fn run(&self, text: &str) -> Result<RawEmbedding> {
        let sanitized = sanitize_text(text);
        let encoding = self
            .tokenizer
            .encode(sanitized.as_str(), true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mut attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        if input_ids.len() > self.max_length {
            debug!(
                "Truncating query from {} to {} tokens",
                input_ids.len(),
                self.max_length
            );
            input_ids.truncate(self.max_length);
            attention_mask.truncate(self.max_length);
        }
        let seq_len = input_ids.len();
        let token_type_ids = vec![0i64; seq_len];

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .context("Failed to create input_ids array")?;
        let attention_mask_array = Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .context("Failed to create attention_mask array")?;
        let token_type_ids_array = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .context("Failed to create token_type_ids array")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => Value::from_array(input_ids_array)?,
            "attention_mask" => Value::from_array(attention_mask_array)?,
            "token_type_ids" => Value::from_array(token_type_ids_array)?
        ])?;

        // Output names vary between exports, so take the first
        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;
        let shape = output.shape().to_vec();
        let values: Vec<f32> = output.iter().copied().collect();

        match shape.as_slice() {
            [1, tokens, hidden] => Ok(RawEmbedding::TokenLevel {
                values,
                tokens: *tokens,
                hidden: *hidden,
                attention_mask,
            }),
            [1, hidden] => Ok(RawEmbedding::Batched(vec![values[..*hidden].to_vec()])),
            [_] => Ok(RawEmbedding::Pooled(values)),
            other => anyhow::bail!("Model outputs unexpected dimensions: {:?}", other),
        }
    }
}

impl EmbeddingBackend for OnnxEmbeddingModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_raw(&self, text: &str) -> crate::rag::errors::Result<RawEmbedding> {
        self.run(text)
            .map_err(|e| RetrievalError::Embedding(format!("{:#}", e)))
    }
}

/// Loads ONNX models on the blocking pool
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    tokenizer_path: PathBuf,
    threads: usize,
    max_length: usize,
}

impl OnnxModelLoader {
    pub fn new(config: &EmbeddingModelConfig) -> Self {
        Self {
            tokenizer_path: config.resolved_tokenizer_path(),
            threads: config.threads,
            max_length: config.context_size,
        }
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self, path: &Path) -> crate::rag::errors::Result<ModelHandle> {
        let model_path = path.to_path_buf();
        let tokenizer_path = self.tokenizer_path.clone();
        let display = model_path.display().to_string();
        let (threads, max_length) = (self.threads, self.max_length);

        let loaded = tokio::task::spawn_blocking(move || {
            OnnxEmbeddingModel::load(&model_path, &tokenizer_path, threads, max_length)
        })
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
