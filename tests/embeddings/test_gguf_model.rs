// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! GGUF embedding model through llama.cpp
//!
//! Real-model tests are ignored by default. Run them with
//! `EMBEDDING_MODEL_PATH=/path/to/nomic-embed-text-v1.5.Q4_K_M.gguf` and `--ignored`.

#![cfg(feature = "llama")]

use std::path::PathBuf;
use std::sync::Arc;

use fabstir_rag_retrieval::embeddings::{
    EmbeddingModelConfig, GgufModelLoader, QueryEmbedder, SharedModel,
};
use fabstir_rag_retrieval::rag::RetrievalError;

fn model_path() -> PathBuf {
    PathBuf::from(std::env::var("EMBEDDING_MODEL_PATH").expect("EMBEDDING_MODEL_PATH not set"))
}

#[tokio::test]
async fn test_invalid_file_is_load_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"definitely not gguf").unwrap();

    let loader = GgufModelLoader::new(&EmbeddingModelConfig::default());
    let model = SharedModel::new(file.path(), Arc::new(loader));
    assert!(matches!(
        model.init().await,
        Err(RetrievalError::ModelLoad { .. })
    ));
}

#[tokio::test]
#[ignore] // Requires a GGUF embedding model on disk
async fn test_real_model_embeds_query() {
    let config = EmbeddingModelConfig {
        model_path: model_path(),
        ..Default::default()
    };
    let model = Arc::new(SharedModel::from_config(&config).unwrap());
    let handle = model.init().await.unwrap();
    let embedder = QueryEmbedder::from_config(Arc::clone(&model), &config);

    let vector = embedder.embed("search_query: How do I reset my password?").await.unwrap();
    assert_eq!(vector.dimension(), handle.dimension());

    let again = embedder.embed("search_query: How do I reset my password?").await.unwrap();
    assert_eq!(vector, again);
}

#[tokio::test]
#[ignore] // Requires a GGUF embedding model on disk
async fn test_real_model_similar_texts_are_closer() {
    let config = EmbeddingModelConfig {
        model_path: model_path(),
        normalize: true,
        ..Default::default()
    };
    let model = Arc::new(SharedModel::from_config(&config).unwrap());
    model.init().await.unwrap();
    let embedder = QueryEmbedder::from_config(Arc::clone(&model), &config);

    let query = embedder.embed("How do I change my password?").await.unwrap();
    let related = embedder.embed("Steps to reset an account password").await.unwrap();
    let unrelated = embedder.embed("Recipe for banana bread").await.unwrap();

    let distance = |a: &[f32], b: &[f32]| -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    };
    assert!(
        distance(query.as_slice(), related.as_slice())
            < distance(query.as_slice(), unrelated.as_slice())
    );
}
