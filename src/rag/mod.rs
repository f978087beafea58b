// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) module
// Best-effort context retrieval for chat: embed, search, filter

pub mod config;
pub mod errors;
pub mod filter;
pub mod service;

pub use config::{RagConfig, RetrievalConfig};
pub use errors::{Result, RetrievalError, Stage};
pub use filter::{filter, filter_results, RelevanceFilter};
pub use service::RetrievalService;
