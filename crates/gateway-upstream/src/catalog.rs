//! TTL cache of the models installed on the backend.
//!
//! Reads of a fresh snapshot never wait on I/O. Refreshes are serialized so
//! that a burst of requests after expiry triggers one upstream fetch; a
//! failed fetch keeps serving the previous list.

use crate::client::UpstreamClient;
use gateway_core::GatewayResult;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Models commonly available for pulling, shown alongside the installed ones
pub const POPULAR_MODELS: &[&str] = &[
    "mistral",
    "llama3",
    "llama3.1",
    "llama3.2",
    "llama2",
    "codellama",
    "phi3",
    "gemma2",
    "qwen2.5",
    "deepseek-coder",
    "nomic-embed-text",
    "all-minilm",
    "tinyllama",
    "orca-mini",
    "vicuna",
];

#[derive(Debug, Clone)]
struct Snapshot {
    models: Arc<Vec<String>>,
    fetched_at: Instant,
}

/// Cached view of the backend model catalog
#[derive(Debug)]
pub struct ModelCatalogCache {
    client: UpstreamClient,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    refresh: Mutex<()>,
}

impl ModelCatalogCache {
    /// Create an empty cache
    #[must_use]
    pub fn new(client: UpstreamClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Snapshot lifetime
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// When the current list was fetched, if ever
    #[must_use]
    pub fn last_fetched(&self) -> Option<Instant> {
        self.snapshot.read().as_ref().map(|s| s.fetched_at)
    }

    /// Installed model names in backend order.
    ///
    /// Never fails: when the backend cannot be reached, the last good list
    /// is returned, or an empty list if there never was one.
    pub async fn get_models(&self, force_refresh: bool) -> Vec<String> {
        if !force_refresh {
            if let Some(models) = self.fresh() {
                debug!(models = models.len(), "Serving cached model catalog");
                return models;
            }
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited
        if !force_refresh {
            if let Some(models) = self.fresh() {
                return models;
            }
        }

        match self.fetch().await {
            Ok(models) => {
                info!(models = models.len(), "Refreshed model catalog");
                *self.snapshot.write() = Some(Snapshot {
                    models: Arc::new(models.clone()),
                    fetched_at: Instant::now(),
                });
                models
            }
            Err(e) => {
                let cached = self.cached().unwrap_or_default();
                warn!(error = %e, cached = cached.len(), "Model catalog refresh failed, serving last known list");
                cached
            }
        }
    }

    /// Map a requested model name onto an installed one.
    ///
    /// A request matches an installed model by exact name, by the name
    /// without its tag (`llama3` matches `llama3:8b`), or by the implicit
    /// `:latest` tag. With an empty catalog nothing can be checked and the
    /// request is returned unchanged.
    pub async fn resolve_model(&self, requested: &str) -> Option<String> {
        let models = self.get_models(false).await;
        if models.is_empty() {
            return Some(requested.to_string());
        }
        resolve_in(&models, requested)
    }

    async fn fetch(&self) -> GatewayResult<Vec<String>> {
        let response = self.client.get("/api/tags").await?;
        Ok(parse_model_names(&response))
    }

    fn fresh(&self) -> Option<Vec<String>> {
        let snapshot = self.snapshot.read();
        snapshot
            .as_ref()
            .filter(|s| s.fetched_at.elapsed() < self.ttl)
            .map(|s| s.models.as_ref().clone())
    }

    fn cached(&self) -> Option<Vec<String>> {
        self.snapshot.read().as_ref().map(|s| s.models.as_ref().clone())
    }
}

/// Extract `models[].name` from a model listing, keeping backend order.
///
/// A missing `models` array yields an empty list; entries without a name
/// are skipped.
#[must_use]
pub fn parse_model_names(response: &Value) -> Vec<String> {
    response
        .get("models")
        .and_then(Value::as_array)
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn resolve_in(models: &[String], requested: &str) -> Option<String> {
    models
        .iter()
        .find(|installed| {
            installed.as_str() == requested
                || installed.split(':').next() == Some(requested)
                || **installed == format!("{requested}:latest")
        })
        .cloned()
}
