// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local query embedding
//!
//! Loads a quantized embedding model from disk once per process and turns
//! query text into fixed-dimension vectors for similarity search.
//!
//! Backends:
//! - GGUF through llama.cpp (`llama` feature, default)
//! - ONNX sentence transformers through ONNX Runtime (`onnx` feature)

pub mod backend;
pub mod config;
pub mod embedder;
pub mod loader;
pub mod vector;

#[cfg(feature = "llama")]
pub mod llama_model;
#[cfg(feature = "onnx")]
pub mod onnx_model;

pub use backend::{sanitize_text, EmbeddingBackend, ModelHandle, RawEmbedding};
pub use config::{EmbeddingModelConfig, ModelBackend};
pub use embedder::QueryEmbedder;
pub use loader::{loader_for, ModelLoader, SharedModel};
pub use vector::EmbeddingVector;

#[cfg(feature = "llama")]
pub use llama_model::{GgufEmbeddingModel, GgufLoadParams, GgufModelLoader};
#[cfg(feature = "onnx")]
pub use onnx_model::{OnnxEmbeddingModel, OnnxModelLoader};
