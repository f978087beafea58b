// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod embeddings;
pub mod rag;
pub mod vector;

// Re-export main types
pub use embeddings::{
    EmbeddingModelConfig, EmbeddingVector, ModelBackend, QueryEmbedder, SharedModel,
};
pub use rag::{RagConfig, RelevanceFilter, RetrievalConfig, RetrievalError, RetrievalService};
pub use vector::{
    ChromaClient, CollectionHandle, ConnectionState, Document, QueryResult, VectorStore,
    VectorStoreConfig,
};
