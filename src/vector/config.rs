// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the vector store connection

use std::env;
use std::time::Duration;

use url::Url;

/// Connection settings for a Chroma-compatible vector store
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Base URL of the store, e.g. `http://localhost:8000`
    pub endpoint: String,
    /// Tenant the collection lives in
    pub tenant: String,
    /// Database the collection lives in
    pub database: String,
    /// Token sent as bearer auth and `x-chroma-token`
    pub api_key: Option<String>,
    /// Heartbeat timeout in milliseconds
    pub health_timeout_ms: u64,
    /// Collection lookup and query timeout in milliseconds
    pub query_timeout_ms: u64,
}

impl VectorStoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("VECTOR_STORE_URL").unwrap_or(defaults.endpoint),
            tenant: env::var("VECTOR_STORE_TENANT").unwrap_or(defaults.tenant),
            database: env::var("VECTOR_STORE_DATABASE").unwrap_or(defaults.database),
            api_key: env::var("VECTOR_STORE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            health_timeout_ms: env::var("VECTOR_STORE_HEALTH_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.health_timeout_ms),
            query_timeout_ms: env::var("VECTOR_STORE_QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.query_timeout_ms),
        }
    }

    /// Parsed endpoint URL with any trailing slash removed
    pub fn base_url(&self) -> Result<Url, String> {
        let trimmed = self.endpoint.trim().trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|e| format!("Invalid endpoint URL: {}", e))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(format!("Unsupported endpoint scheme: {}", other)),
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.base_url()?;
        if self.tenant.is_empty() {
            return Err("Tenant must not be empty".to_string());
        }
        if self.database.is_empty() {
            return Err("Database must not be empty".to_string());
        }
        if self.health_timeout_ms == 0 {
            return Err("Health timeout must be greater than 0".to_string());
        }
        if self.query_timeout_ms == 0 {
            return Err("Query timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
            api_key: None,
            health_timeout_ms: 2000,
            query_timeout_ms: 10000,
        }
    }
}
