// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for context retrieval

use std::env;
use std::path::Path;

use crate::embeddings::EmbeddingModelConfig;
use crate::rag::errors::{Result, RetrievalError};
use crate::vector::VectorStoreConfig;

/// Tuning knobs for a retrieval call
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Results at or above this distance are discarded
    ///
    /// Calibrated for the default embedding model and L2 distance; other
    /// models or metrics need their own value.
    pub threshold_distance: f32,
    /// Neighbours requested from the store before filtering
    pub candidate_count: usize,
    /// Maximum documents returned after filtering
    pub max_results: usize,
    /// Collection holding the indexed corpus
    pub collection_name: String,
    /// Heartbeat the store before each query
    pub probe_before_query: bool,
}

impl RetrievalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            threshold_distance: env::var("RAG_THRESHOLD_DISTANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.threshold_distance),
            candidate_count: env::var("RAG_CANDIDATE_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.candidate_count),
            max_results: env::var("RAG_MAX_RESULTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_results),
            collection_name: env::var("RAG_COLLECTION").unwrap_or(defaults.collection_name),
            probe_before_query: env::var("RAG_PROBE_BEFORE_QUERY")
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(defaults.probe_before_query),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.threshold_distance.is_finite() || self.threshold_distance <= 0.0 {
            return Err("Threshold distance must be a positive number".to_string());
        }
        if self.candidate_count == 0 {
            return Err("Candidate count must be greater than 0".to_string());
        }
        if self.max_results == 0 {
            return Err("Max results must be greater than 0".to_string());
        }
        if self.max_results > self.candidate_count {
            return Err(format!(
                "Max results ({}) cannot exceed candidate count ({})",
                self.max_results, self.candidate_count
            ));
        }
        if self.collection_name.trim().is_empty() {
            return Err("Collection name must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            threshold_distance: 35.0,
            candidate_count: 5,
            max_results: 3,
            collection_name: "documents".to_string(),
            probe_before_query: true,
        }
    }
}

/// Everything needed to build a `RetrievalService`
#[derive(Debug, Clone, Default)]
pub struct RagConfig {
    pub retrieval: RetrievalConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingModelConfig,
}

impl RagConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            retrieval: RetrievalConfig::from_env(),
            vector_store: VectorStoreConfig::from_env(),
            embedding: EmbeddingModelConfig::from_env(),
        }
    }

    /// Load a dotenv file into the environment, then read it
    ///
    /// Variables already set in the process environment take precedence.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        dotenv::from_path(path).map_err(|e| {
            RetrievalError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_env();
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.retrieval.validate()?;
        self.vector_store.validate()?;
        self.embedding.validate()?;
        Ok(())
    }
}
