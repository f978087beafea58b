// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding backend boundary
//!
//! Backends (llama.cpp GGUF, ONNX Runtime) report their raw output as a
//! [`RawEmbedding`]. The shapes differ per backend and per model export:
//! - an already pooled sentence vector
//! - a `[1, hidden]` batch with a single row
//! - token-level `[seq_len, hidden]` output that still needs mean pooling
//!
//! [`RawEmbedding::into_vector`] is the only place these shapes are turned
//! into an [`EmbeddingVector`]; nothing downstream inspects raw output.

use std::sync::Arc;

use super::vector::EmbeddingVector;
use crate::rag::errors::{Result, RetrievalError};

/// Raw output of a single-text embedding call
#[derive(Debug, Clone, PartialEq)]
pub enum RawEmbedding {
    /// Sentence-level vector, already pooled by the model
    Pooled(Vec<f32>),
    /// Batch output; exactly one row is expected for a single query
    Batched(Vec<Vec<f32>>),
    /// Row-major `[tokens, hidden]` matrix with a per-token attention mask
    TokenLevel {
        values: Vec<f32>,
        tokens: usize,
        hidden: usize,
        attention_mask: Vec<i64>,
    },
}

impl RawEmbedding {
    /// Normalizes any backend shape into a flat vector of `dimension` floats
    pub fn into_vector(self, dimension: usize) -> Result<EmbeddingVector> {
        let values = match self {
            RawEmbedding::Pooled(values) => values,
            RawEmbedding::Batched(mut rows) => {
                if rows.len() != 1 {
                    return Err(RetrievalError::InvalidEmbedding(format!(
                        "expected a single batch row, got {}",
                        rows.len()
                    )));
                }
                rows.swap_remove(0)
            }
            RawEmbedding::TokenLevel {
                values,
                tokens,
                hidden,
                attention_mask,
            } => mean_pool(&values, tokens, hidden, &attention_mask)?,
        };
        EmbeddingVector::with_dimension(values, dimension)
    }
}

/// Mean pooling over the token axis, weighted by the attention mask
fn mean_pool(values: &[f32], tokens: usize, hidden: usize, mask: &[i64]) -> Result<Vec<f32>> {
    if tokens == 0 || hidden == 0 {
        return Err(RetrievalError::InvalidEmbedding(
            "token-level output has an empty axis".to_string(),
        ));
    }
    if values.len() != tokens * hidden {
        return Err(RetrievalError::InvalidEmbedding(format!(
            "token-level output has {} values, expected {}x{}",
            values.len(),
            tokens,
            hidden
        )));
    }
    if !mask.is_empty() && mask.len() != tokens {
        return Err(RetrievalError::InvalidEmbedding(format!(
            "attention mask covers {} tokens, output has {}",
            mask.len(),
            tokens
        )));
    }

    let mut pooled = vec![0.0f32; hidden];
    let mut sum_mask = 0.0f32;

    for (i, row) in values.chunks_exact(hidden).enumerate() {
        // An empty mask means every token counts
        let weight = mask.get(i).map_or(1.0, |&m| m as f32);
        sum_mask += weight;
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v * weight;
        }
    }

    for val in &mut pooled {
        *val /= sum_mask.max(1e-9);
    }
    Ok(pooled)
}

/// A loaded embedding model
///
/// Implementations must tolerate concurrent calls: either by giving every call
/// its own inference context over shared weights, or by serializing access to
/// a single session internally. Calls are blocking and compute-bound; callers
/// run them on the blocking thread pool.
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier for logs
    fn model_name(&self) -> &str;

    /// Output dimension D after normalization
    fn dimension(&self) -> usize;

    /// Runs inference for one text
    fn embed_raw(&self, text: &str) -> Result<RawEmbedding>;
}

/// Shared handle to a loaded model
pub type ModelHandle = Arc<dyn EmbeddingBackend>;

/// Strips characters that break C-string tokenizers (NUL and C0 controls
/// other than tab, newline and carriage return)
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\0' && (*c >= ' ' || *c == '\t' || *c == '\n' || *c == '\r'))
        .collect()
}
