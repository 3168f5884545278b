//! Model catalog cache seeded with static defaults and refreshed in the background.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{Model, ProviderError};

#[derive(Debug, Clone)]
pub struct ModelCatalogCache {
    provider: String,
    models: Arc<RwLock<Vec<Model>>>,
}

impl ModelCatalogCache {
    pub fn new(provider: impl Into<String>, defaults: Vec<Model>) -> Self {
        Self {
            provider: provider.into(),
            models: Arc::new(RwLock::new(defaults)),
        }
    }

    pub fn snapshot(&self) -> Vec<Model> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the cached models. An empty listing keeps the current entries.
    pub fn replace(&self, models: Vec<Model>) {
        if models.is_empty() {
            return;
        }

        *self.models.write().unwrap_or_else(PoisonError::into_inner) = models;
    }

    /// Awaits `fetch` and stores its models; failures leave the cache untouched.
    pub async fn refresh<F>(&self, fetch: F) -> Result<Vec<Model>, ProviderError>
    where
        F: Future<Output = Result<Vec<Model>, ProviderError>>,
    {
        match fetch.await {
            Ok(models) => {
                tracing::debug!(
                    phase = "catalog",
                    event = "refreshed",
                    provider = %self.provider,
                    models = models.len(),
                );
                self.replace(models);
                Ok(self.snapshot())
            }
            Err(error) => {
                tracing::warn!(
                    phase = "catalog",
                    event = "refresh_failed",
                    provider = %self.provider,
                    error = %error,
                    "keeping default model list",
                );
                Err(error)
            }
        }
    }

    /// Spawns a refresh on the current tokio runtime, if there is one.
    ///
    /// Never blocks; without a runtime the defaults simply stay in place.
    pub fn refresh_in_background<F>(&self, fetch: F)
    where
        F: Future<Output = Result<Vec<Model>, ProviderError>> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(
                phase = "catalog",
                event = "refresh_skipped",
                provider = %self.provider,
                "no async runtime available",
            );
            return;
        };

        let cache = self.clone();
        handle.spawn(async move {
            let _ = cache.refresh(fetch).await;
        });
    }
}
