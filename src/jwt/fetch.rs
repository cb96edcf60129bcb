//! Remote JWKS retrieval
//!
//! Kept apart from verification: the application decides when to fetch, either by
//! calling [`JwksFetcher::refresh_if_stale`] itself or by running
//! [`JwksFetcher::spawn_refresh_task`].

use super::jwks::{Jwks, JwksCache};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// JWKS retrieval errors
#[derive(Error, Debug)]
pub enum JwksError {
    #[error("JWKS fetch error: {0}")]
    Fetch(String),

    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    #[error("JWKS document invalid: {0}")]
    Parse(String),
}

/// Fetches a JWKS document from an HTTP endpoint
#[derive(Debug, Clone)]
pub struct JwksFetcher {
    endpoint: String,
    client: reqwest::Client,
}

impl JwksFetcher {
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: &str, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch JWKS from endpoint
    pub async fn fetch(&self) -> Result<Jwks, JwksError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Status(response.status().as_u16()));
        }

        response
            .json::<Jwks>()
            .await
            .map_err(|e| JwksError::Parse(e.to_string()))
    }

    /// Fetch and install a fresh key set, returning the usable key count
    pub async fn refresh(&self, cache: &JwksCache) -> Result<usize, JwksError> {
        let jwks = self.fetch().await?;
        Ok(cache.refresh(jwks))
    }

    /// Refresh only when the cache is past its TTL. Returns whether a refresh happened.
    pub async fn refresh_if_stale(&self, cache: &JwksCache) -> Result<bool, JwksError> {
        if !cache.is_stale() {
            return Ok(false);
        }
        self.refresh(cache).await?;
        Ok(true)
    }

    /// Check the cache every `interval`, refreshing when stale.
    ///
    /// Failures are logged and leave the previous keys in place.
    pub fn spawn_refresh_task(
        self,
        cache: Arc<JwksCache>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.refresh_if_stale(&cache).await {
                    Ok(true) => {
                        tracing::info!(endpoint = %self.endpoint, keys = cache.len(), "JWKS refreshed")
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(endpoint = %self.endpoint, error = %e, "JWKS refresh failed")
                    }
                }
            }
        })
    }
}
