// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector store data types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arbitrary per-document metadata as stored in the collection
pub type Metadata = HashMap<String, Value>;

/// A retrievable unit of text from the indexed corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A document paired with its distance to the query (lower = more similar)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub document: Document,
    pub distance: f32,
}

impl QueryResult {
    pub fn new(document: Document, distance: f32) -> Self {
        Self { document, distance }
    }
}

/// Resolved handle to a named collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionHandle {
    /// Store-assigned identifier used in query URLs
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Indexed vector dimension, when the store reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// Whether the last probe reached the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Cached outcome of the most recent connectivity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ConnectionState {
    /// Initial state before any probe
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            last_checked: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn mark_connected(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.last_checked = Some(Utc::now());
        self.last_error = None;
    }

    pub fn mark_disconnected(&mut self, reason: impl Into<String>) {
        self.status = ConnectionStatus::Disconnected;
        self.last_checked = Some(Utc::now());
        self.last_error = Some(reason.into());
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected()
    }
}
