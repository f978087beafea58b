// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relevance filtering of vector store results
//!
//! A result is relevant only if its distance is strictly below the threshold.
//! Input is expected ascending by distance; the filter keeps that order and
//! never pads the output.

use super::config::RetrievalConfig;
use crate::vector::{Document, QueryResult};

/// Relevant results with their distances, at most `max_results`
pub fn filter_results(
    results: Vec<QueryResult>,
    threshold_distance: f32,
    max_results: usize,
) -> Vec<QueryResult> {
    results
        .into_iter()
        .filter(|r| r.distance < threshold_distance)
        .take(max_results)
        .collect()
}

/// Relevant documents, at most `max_results`
pub fn filter(
    results: Vec<QueryResult>,
    threshold_distance: f32,
    max_results: usize,
) -> Vec<Document> {
    filter_results(results, threshold_distance, max_results)
        .into_iter()
        .map(|r| r.document)
        .collect()
}

/// Threshold and cap taken from configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFilter {
    pub threshold_distance: f32,
    pub max_results: usize,
}

impl RelevanceFilter {
    pub fn new(threshold_distance: f32, max_results: usize) -> Self {
        Self {
            threshold_distance,
            max_results,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.threshold_distance, config.max_results)
    }

    pub fn apply(&self, results: Vec<QueryResult>) -> Vec<Document> {
        filter(results, self.threshold_distance, self.max_results)
    }

    pub fn apply_with_scores(&self, results: Vec<QueryResult>) -> Vec<QueryResult> {
        filter_results(results, self.threshold_distance, self.max_results)
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}
