// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Query embedding through the shared model
//!
//! Uses the deterministic test backend, so no model download is needed.

use std::path::Path;
use std::sync::Arc;

use fabstir_rag_retrieval::embeddings::{
    EmbeddingModelConfig, ModelBackend, QueryEmbedder, SharedModel,
};
use fabstir_rag_retrieval::rag::RetrievalError;
use futures_util::future::join_all;

use crate::common::{self, FixedLoader, DIMENSION};

#[tokio::test]
async fn test_embed_has_model_dimension() {
    let (model, _file) = common::test_model();
    model.init().await.unwrap();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, false);

    let vector = embedder.embed("What is the refund policy?").await.unwrap();
    assert_eq!(vector.dimension(), DIMENSION);
    assert!(vector.as_slice().iter().all(|v| v.is_finite()));
}

#[tokio::test]
async fn test_embed_is_deterministic() {
    let (model, _file) = common::test_model();
    model.init().await.unwrap();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, false);

    let a = embedder.embed("same text").await.unwrap();
    let b = embedder.embed("same text").await.unwrap();
    let c = embedder.embed("other text").await.unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[tokio::test]
async fn test_embed_empty_is_error() {
    let (model, _file) = common::test_model();
    model.init().await.unwrap();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, false);

    assert!(matches!(
        embedder.embed("").await,
        Err(RetrievalError::EmptyInput)
    ));
}

#[tokio::test]
async fn test_embed_before_load_is_not_ready() {
    let (model, _file) = common::test_model();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, false);

    assert!(matches!(
        embedder.embed("hello").await,
        Err(RetrievalError::NotReady)
    ));
}

#[tokio::test]
async fn test_normalized_vectors_have_unit_length() {
    let (model, _file) = common::test_model();
    model.init().await.unwrap();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, true);

    let vector = embedder.embed("normalize me").await.unwrap();
    let norm: f32 = vector.as_slice().iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn test_concurrent_embeds_agree() {
    let (model, _file) = common::test_model();
    model.init().await.unwrap();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, false);

    let vectors = join_all((0..10).map(|_| embedder.embed("shared question"))).await;
    let first = vectors[0].as_ref().unwrap();
    assert!(vectors.iter().all(|v| v.as_ref().unwrap() == first));
}

#[tokio::test]
async fn test_missing_model_file_is_load_error() {
    let model = SharedModel::new("/nonexistent/models/embed.gguf", Arc::new(FixedLoader));
    match model.init().await {
        Err(RetrievalError::ModelLoad { path, .. }) => assert!(path.ends_with("embed.gguf")),
        other => panic!("expected ModelLoad, got {:?}", other.err()),
    }
    assert!(!model.is_loaded().await);
}

#[test]
fn test_model_path_resolves_against_resource_dir() {
    let config = EmbeddingModelConfig {
        resource_dir: "/opt/assistant/resources".into(),
        model_path: "models/nomic-embed.onnx".into(),
        backend: ModelBackend::Onnx,
        ..Default::default()
    };
    assert_eq!(
        config.resolved_model_path(),
        Path::new("/opt/assistant/resources/models/nomic-embed.onnx")
    );
}
