// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the local embedding model

use std::env;
use std::path::{Path, PathBuf};

/// Which runtime loads the model file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// Quantized GGUF model through llama.cpp
    Gguf,
    /// ONNX sentence transformer through ONNX Runtime
    Onnx,
}

impl ModelBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "gguf" | "llama" => Some(ModelBackend::Gguf),
            "onnx" => Some(ModelBackend::Onnx),
            _ => None,
        }
    }

    /// Guess from the file extension, defaulting to GGUF
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => ModelBackend::Onnx,
            _ => ModelBackend::Gguf,
        }
    }
}

/// Configuration for loading the embedding model
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    /// Application resource directory that relative paths resolve against
    pub resource_dir: PathBuf,
    /// Model file, absolute or relative to `resource_dir`
    pub model_path: PathBuf,
    /// Tokenizer JSON for ONNX models (defaults to `tokenizer.json` beside the model)
    pub tokenizer_path: Option<PathBuf>,
    /// Runtime used to load the model
    pub backend: ModelBackend,
    /// Layers offloaded to GPU (GGUF only)
    pub gpu_layers: u32,
    /// Context length in tokens; longer queries are truncated
    pub context_size: usize,
    /// Threads per inference call
    pub threads: usize,
    /// Upper bound on embedding calls running at once
    pub max_concurrent_embeddings: usize,
    /// Scale vectors to unit length before querying
    pub normalize: bool,
}

impl EmbeddingModelConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let model_path = env::var("EMBEDDING_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.model_path);
        let backend = env::var("EMBEDDING_MODEL_BACKEND")
            .ok()
            .and_then(|v| ModelBackend::parse(&v))
            .unwrap_or_else(|| ModelBackend::from_path(&model_path));

        Self {
            resource_dir: env::var("APP_RESOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.resource_dir),
            model_path,
            tokenizer_path: env::var("EMBEDDING_TOKENIZER_PATH").ok().map(PathBuf::from),
            backend,
            gpu_layers: env::var("EMBEDDING_GPU_LAYERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gpu_layers),
            context_size: env::var("EMBEDDING_CONTEXT_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.context_size),
            threads: env::var("EMBEDDING_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.threads),
            max_concurrent_embeddings: env::var("EMBEDDING_MAX_CONCURRENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_concurrent_embeddings),
            normalize: env::var("EMBEDDING_NORMALIZE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.normalize),
        }
    }

    /// Model path with relative paths resolved against the resource directory
    pub fn resolved_model_path(&self) -> PathBuf {
        if self.model_path.is_absolute() {
            self.model_path.clone()
        } else {
            self.resource_dir.join(&self.model_path)
        }
    }

    /// Tokenizer path for ONNX models
    pub fn resolved_tokenizer_path(&self) -> PathBuf {
        match &self.tokenizer_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.resource_dir.join(p),
            None => {
                let model = self.resolved_model_path();
                model
                    .parent()
                    .map(|dir| dir.join("tokenizer.json"))
                    .unwrap_or_else(|| PathBuf::from("tokenizer.json"))
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model_path.as_os_str().is_empty() {
            return Err("Model path must not be empty".to_string());
        }
        if self.context_size == 0 {
            return Err("Context size must be greater than 0".to_string());
        }
        if self.threads == 0 {
            return Err("Thread count must be greater than 0".to_string());
        }
        if self.max_concurrent_embeddings == 0 {
            return Err("Max concurrent embeddings must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for EmbeddingModelConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("./resources"),
            model_path: PathBuf::from("models/nomic-embed-text-v1.5.Q4_K_M.gguf"),
            tokenizer_path: None,
            backend: ModelBackend::Gguf,
            gpu_layers: 0,
            context_size: 2048,
            threads: 4,
            max_concurrent_embeddings: 2,
            normalize: false,
        }
    }
}
