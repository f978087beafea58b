// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the retrieval pipeline
//!
//! Every stage of `retrieve()` reports failures through [`RetrievalError`]:
//! - Model loading (missing, unreadable or invalid model file)
//! - Embedding (model not ready, empty input, malformed backend output)
//! - Vector store connectivity (unreachable, timeouts)
//! - Collection resolution (named collection absent)
//! - Query execution (dimension mismatch, malformed responses)
//!
//! The facade converts all of these into an empty result; only model load
//! failures are surfaced to the operator, once, from `init()`.

use std::fmt;

use thiserror::Error;

/// Pipeline stage an error originated from, used as a structured log field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Model,
    Embed,
    Connect,
    Collection,
    Query,
    Config,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Model => "model",
            Stage::Embed => "embed",
            Stage::Connect => "connect",
            Stage::Collection => "collection",
            Stage::Query => "query",
            Stage::Config => "config",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while retrieving context for a query
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Model file missing, unreadable or not a valid model
    #[error("Failed to load embedding model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    /// Model was never loaded, failed to load, or has been disposed
    #[error("Embedding model not ready")]
    NotReady,

    /// Query text is empty after trimming
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// Backend inference failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Backend produced output that cannot be normalized into a vector
    #[error("Invalid embedding output: {0}")]
    InvalidEmbedding(String),

    /// Vector store unreachable
    #[error("Vector store unreachable at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// Vector store request timed out
    #[error("Vector store {operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Named collection does not exist in the store
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Query vector length differs from the collection's indexed dimension
    #[error("Dimension mismatch: collection expects {expected}D vectors, query has {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Store rejected the query or returned a malformed response
    #[error("Query failed: {0}")]
    Query(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

impl RetrievalError {
    /// Stage of the pipeline this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            RetrievalError::ModelLoad { .. } => Stage::Model,
            RetrievalError::NotReady
            | RetrievalError::EmptyInput
            | RetrievalError::Embedding(_)
            | RetrievalError::InvalidEmbedding(_) => Stage::Embed,
            RetrievalError::Connection { .. } | RetrievalError::Timeout { .. } => Stage::Connect,
            RetrievalError::CollectionNotFound(_) => Stage::Collection,
            RetrievalError::DimensionMismatch { .. } | RetrievalError::Query(_) => Stage::Query,
            RetrievalError::InvalidConfig(_) => Stage::Config,
        }
    }

    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            RetrievalError::ModelLoad { .. } => "MODEL_LOAD_FAILED",
            RetrievalError::NotReady => "MODEL_NOT_READY",
            RetrievalError::EmptyInput => "EMPTY_INPUT",
            RetrievalError::Embedding(_) => "EMBEDDING_FAILED",
            RetrievalError::InvalidEmbedding(_) => "INVALID_EMBEDDING",
            RetrievalError::Connection { .. } => "STORE_UNREACHABLE",
            RetrievalError::Timeout { .. } => "STORE_TIMEOUT",
            RetrievalError::CollectionNotFound(_) => "COLLECTION_NOT_FOUND",
            RetrievalError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            RetrievalError::Query(_) => "QUERY_FAILED",
            RetrievalError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Get user-friendly error message for operators
    pub fn user_message(&self) -> String {
        match self {
            RetrievalError::ModelLoad { path, .. } => {
                format!("Embedding model could not be loaded from {}", path)
            }
            RetrievalError::Connection { endpoint, .. } => {
                format!("Document store is not reachable at {}", endpoint)
            }
            RetrievalError::CollectionNotFound(name) => {
                format!("Document collection '{}' has not been indexed", name)
            }
            RetrievalError::DimensionMismatch { expected, actual } => format!(
                "Embedding model produces {}D vectors but the collection was indexed with {}D",
                actual, expected
            ),
            _ => self.to_string(),
        }
    }

    /// Whether a later caller-initiated retry could succeed without operator action
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RetrievalError::Connection { .. } | RetrievalError::Timeout { .. }
        )
    }
}
