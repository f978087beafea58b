// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RetrievalService end to end: fixed embedding model + stand-in Chroma server

use std::sync::Arc;

use fabstir_rag_retrieval::embeddings::QueryEmbedder;
use fabstir_rag_retrieval::rag::{RetrievalConfig, RetrievalError, RetrievalService};
use fabstir_rag_retrieval::vector::{
    ChromaClient, ConnectionStatus, VectorStore, VectorStoreConfig,
};
use futures_util::future::join_all;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, DIMENSION};

fn retrieval_config() -> RetrievalConfig {
    RetrievalConfig {
        threshold_distance: 35.0,
        candidate_count: 5,
        max_results: 5,
        ..Default::default()
    }
}

/// Service wired to `endpoint`; the temp file backs the model path
fn service_for(
    endpoint: String,
    config: RetrievalConfig,
) -> (RetrievalService, tempfile::NamedTempFile) {
    let (model, file) = common::test_model();
    let embedder = QueryEmbedder::new(Arc::clone(&model), 2, false);
    let store: Arc<dyn VectorStore> = Arc::new(
        ChromaClient::new(VectorStoreConfig {
            endpoint,
            ..Default::default()
        })
        .unwrap(),
    );
    let service = RetrievalService::new(model, embedder, store, config).unwrap();
    (service, file)
}

#[tokio::test]
async fn test_retrieve_returns_relevant_texts_in_order() {
    let server = common::healthy_store(&[10.0, 20.0, 34.0, 36.0, 50.0]).await;
    let (service, _file) = service_for(server.uri(), retrieval_config());
    service.init().await.unwrap();

    let texts = service.retrieve("How do I rotate my API key?").await;
    assert_eq!(texts, vec!["text at 10", "text at 20", "text at 34"]);
}

#[tokio::test]
async fn test_retrieve_nothing_relevant() {
    let server = common::healthy_store(&[35.0, 40.0, 41.5]).await;
    let (service, _file) = service_for(server.uri(), retrieval_config());

    assert!(service.retrieve("unrelated question").await.is_empty());
}

#[tokio::test]
async fn test_retrieve_respects_max_results() {
    let server = common::healthy_store(&[1.0, 2.0, 3.0, 4.0, 5.0]).await;
    let (service, _file) = service_for(server.uri(), RetrievalConfig::default());

    let documents = service.retrieve_documents("query").await;
    assert_eq!(documents.len(), 3);
    assert_eq!(documents[0].id, "doc-0");
    assert!(documents[0].metadata.is_some());
}

#[tokio::test]
async fn test_retrieve_is_idempotent() {
    let server = common::healthy_store(&[4.0, 8.0, 40.0]).await;
    let (service, _file) = service_for(server.uri(), retrieval_config());

    let first = service.retrieve_with_scores("same question").await;
    let second = service.retrieve_with_scores("same question").await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn test_unreachable_store_yields_empty() {
    let (service, _file) = service_for(common::unused_endpoint(), retrieval_config());
    service.init().await.unwrap();

    assert!(service.retrieve("query").await.is_empty());
    assert_eq!(
        service.connection_state().await.status,
        ConnectionStatus::Disconnected
    );
    assert!(matches!(
        service.try_retrieve("query").await,
        Err(RetrievalError::Connection { .. })
    ));
}

#[tokio::test]
async fn test_empty_query_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (service, _file) = service_for(server.uri(), retrieval_config());

    assert!(service.retrieve("").await.is_empty());
}

#[tokio::test]
async fn test_dimension_mismatch_yields_empty() {
    let server = MockServer::start().await;
    common::mount_heartbeat(&server).await;
    common::mount_collection(&server, "documents", DIMENSION * 2).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (service, _file) = service_for(server.uri(), retrieval_config());

    assert!(service.retrieve("query").await.is_empty());
    assert!(matches!(
        service.try_retrieve("query").await,
        Err(RetrievalError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_missing_collection_yields_empty() {
    let server = MockServer::start().await;
    common::mount_heartbeat(&server).await;
    let (service, _file) = service_for(
        server.uri(),
        RetrievalConfig {
            collection_name: "not-indexed".to_string(),
            ..retrieval_config()
        },
    );

    assert!(service.retrieve("query").await.is_empty());
}

#[tokio::test]
async fn test_reconnect_after_store_comes_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_heartbeat(&server).await;
    let (service, _file) = service_for(server.uri(), retrieval_config());

    assert!(!service.reconnect().await);
    assert!(service.reconnect().await);
    assert_eq!(
        service.connection_state().await.status,
        ConnectionStatus::Connected
    );
}

#[tokio::test]
async fn test_dispose_stops_retrieval_until_init() {
    let server = common::healthy_store(&[1.0]).await;
    let (service, _file) = service_for(server.uri(), retrieval_config());
    service.init().await.unwrap();
    assert!(service.is_ready().await);

    assert!(service.dispose().await);
    assert!(service.retrieve("query").await.is_empty());

    service.init().await.unwrap();
    assert_eq!(service.retrieve("query").await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retrievals_share_model() {
    let server = common::healthy_store(&[3.0, 9.0, 27.0, 81.0]).await;
    let (service, _file) = service_for(server.uri(), retrieval_config());
    let service = Arc::new(service);

    let calls = (0..16).map(|i| {
        let service = Arc::clone(&service);
        async move { service.retrieve(&format!("question {}", i)).await }
    });
    for texts in join_all(calls).await {
        assert_eq!(texts, vec!["text at 3", "text at 9", "text at 27"]);
    }
}
