// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared fixtures: deterministic embedding backend and a stand-in Chroma server
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fabstir_rag_retrieval::embeddings::{
    EmbeddingBackend, ModelHandle, ModelLoader, RawEmbedding, SharedModel,
};
use fabstir_rag_retrieval::rag::Result;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DIMENSION: usize = 4;
pub const COLLECTION_ID: &str = "6b1c0f3e-8d2a-4c1b-9a7e-2f4d5c6b7a80";

/// Embeds text from its bytes; same text, same vector
pub struct FixedEmbeddingBackend;

impl EmbeddingBackend for FixedEmbeddingBackend {
    fn model_name(&self) -> &str {
        "fixed-test-model"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_raw(&self, text: &str) -> Result<RawEmbedding> {
        let mut values = vec![0.0f32; DIMENSION];
        for (i, byte) in text.bytes().enumerate() {
            values[i % DIMENSION] += byte as f32 / 255.0;
        }
        Ok(RawEmbedding::Pooled(values))
    }
}

pub struct FixedLoader;

#[async_trait]
impl ModelLoader for FixedLoader {
    async fn load(&self, _path: &Path) -> Result<ModelHandle> {
        Ok(Arc::new(FixedEmbeddingBackend) as ModelHandle)
    }
}

/// Model file on disk plus an unloaded model pointing at it
pub fn test_model() -> (Arc<SharedModel>, tempfile::NamedTempFile) {
    let file = tempfile::NamedTempFile::new().unwrap();
    let model = Arc::new(SharedModel::new(file.path(), Arc::new(FixedLoader)));
    (model, file)
}

pub fn collection_json(name: &str, dimension: usize) -> Value {
    json!({
        "id": COLLECTION_ID,
        "name": name,
        "metadata": {"hnsw:space": "l2"},
        "dimension": dimension,
        "tenant": "default_tenant",
        "database": "default_database"
    })
}

/// Chroma query response with one result per distance
pub fn query_json(distances: &[f32]) -> Value {
    let ids: Vec<String> = (0..distances.len()).map(|i| format!("doc-{}", i)).collect();
    let documents: Vec<String> = distances.iter().map(|d| format!("text at {}", d)).collect();
    let metadatas: Vec<Value> = (0..distances.len())
        .map(|i| json!({"source": "handbook.md", "chunk": i}))
        .collect();
    json!({
        "ids": [ids],
        "documents": [documents],
        "metadatas": [metadatas],
        "distances": [distances],
        "embeddings": null
    })
}

pub async fn mount_heartbeat(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/heartbeat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"nanosecond heartbeat": 1717000000000000000u64})),
        )
        .mount(server)
        .await;
}

pub async fn mount_collection(server: &MockServer, name: &str, dimension: usize) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/collections/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(collection_json(name, dimension)))
        .mount(server)
        .await;
}

pub async fn mount_query(server: &MockServer, distances: &[f32]) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/collections/{}/query", COLLECTION_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_json(distances)))
        .mount(server)
        .await;
}

/// Healthy store holding `documents` whose query returns `distances`
pub async fn healthy_store(distances: &[f32]) -> MockServer {
    let server = MockServer::start().await;
    mount_heartbeat(&server).await;
    mount_collection(&server, "documents", DIMENSION).await;
    mount_query(&server, distances).await;
    server
}

/// Address with nothing listening on it
pub fn unused_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
