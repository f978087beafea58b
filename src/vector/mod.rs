// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector store access
//!
//! The retrieval pipeline only reads from the store: it probes connectivity,
//! resolves a collection by name and runs nearest-neighbour queries.

pub mod chroma;
pub mod config;
pub mod store;
pub mod types;

pub use chroma::ChromaClient;
pub use config::VectorStoreConfig;
pub use store::VectorStore;
pub use types::{
    CollectionHandle, ConnectionState, ConnectionStatus, Document, Metadata, QueryResult,
};

#[cfg(test)]
pub use store::MockVectorStore;
