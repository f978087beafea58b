// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector store trait definition

use async_trait::async_trait;

use super::types::{CollectionHandle, ConnectionState, QueryResult};
use crate::embeddings::EmbeddingVector;
use crate::rag::errors::Result;

/// Similarity search over an external vector store
///
/// Implementations keep a cached [`ConnectionState`] that is only refreshed
/// when the caller asks (heartbeat) or when a request fails in transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Base URL used in diagnostics
    fn endpoint(&self) -> String;

    /// Probe the store; never errors, failures are recorded in the state
    async fn health_check(&self) -> bool;

    /// Result of the most recent probe or transport failure
    async fn connection_state(&self) -> ConnectionState;

    async fn is_connected(&self) -> bool;

    /// Resolve a collection by name
    ///
    /// Fails with `CollectionNotFound` if the store has no such collection.
    async fn get_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Nearest neighbours of `vector`, ascending by distance
    ///
    /// # Arguments
    /// * `collection` - Collection resolved with `get_collection`
    /// * `vector` - Query embedding; must match the collection's dimension
    /// * `candidate_count` - Maximum number of results to return
    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &EmbeddingVector,
        candidate_count: usize,
    ) -> Result<Vec<QueryResult>>;
}
