// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Canonical embedding vector type

use serde::{Deserialize, Serialize};

use crate::rag::errors::{Result, RetrievalError};

/// Fixed-length sequence of finite floats produced by the loaded model
///
/// Construction goes through [`EmbeddingVector::new`], so every value held
/// downstream has a known dimension and no NaN/inf components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Wraps `values`, rejecting empty or non-finite vectors
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(RetrievalError::InvalidEmbedding(
                "embedding has zero dimensions".to_string(),
            ));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(RetrievalError::InvalidEmbedding(format!(
                "non-finite value at index {}",
                pos
            )));
        }
        Ok(Self(values))
    }

    /// Same as [`new`](Self::new) but also checks the expected dimension
    pub fn with_dimension(values: Vec<f32>, dimension: usize) -> Result<Self> {
        if values.len() != dimension {
            return Err(RetrievalError::InvalidEmbedding(format!(
                "expected {} dimensions, got {}",
                dimension,
                values.len()
            )));
        }
        Self::new(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Scales the vector to unit L2 norm (no-op for the zero vector)
    pub fn l2_normalized(mut self) -> Self {
        let norm = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut self.0 {
                *value /= norm;
            }
        }
        self
    }
}

impl TryFrom<Vec<f32>> for EmbeddingVector {
    type Error = RetrievalError;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<EmbeddingVector> for Vec<f32> {
    fn from(vector: EmbeddingVector) -> Self {
        vector.into_inner()
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
