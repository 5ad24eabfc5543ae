//! Platform HTTP API access.
//!
//! The core only needs one primitive: `request(method, path, json)` against
//! the platform REST API. It is modelled as the [`Api`] trait so tests can
//! substitute a recorder; [`RestClient`] is the reqwest-backed production
//! implementation, with a small route cache for autocomplete-style lookups.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::config::ApiSection;

/// Cached responses are dropped wholesale once this many routes are held.
pub const MAX_CACHE_ENTRIES: usize = 100;

/// Default expiry for cached GET routes.
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ApiError {
    /// The platform answered with a non-success status.
    #[error("api returned {status} for {method} {path}")]
    Status {
        status: u16,
        method: Method,
        path: String,
        body: String,
    },

    /// The response body was not the JSON shape the caller expected.
    #[error("unexpected api payload for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Status { status: 403, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// A successful platform API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// The request/response primitive the runtime core consumes.
#[async_trait]
pub trait Api: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ApiError>;
}

struct CacheEntry {
    body: Value,
    expires_at: Instant,
}

/// reqwest-backed [`Api`] implementation with bot-token authentication.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    /// Route cache for repeated GETs (autocomplete lookups and such).
    cache: DashMap<String, CacheEntry>,
}

impl RestClient {
    pub fn new(token: &str, api: &ApiSection) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            cache: DashMap::new(),
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        Ok(self.request(Method::GET, path, None).await?.body)
    }

    /// Same as [`RestClient::get`] but with simple per-route caching.
    pub async fn get_cached(&self, path: &str, expiry: Duration) -> Result<Value, ApiError> {
        if let Some(body) = self.cache_get(path) {
            debug!(%path, "using cached response");
            return Ok(body);
        }

        let body = self.get(path).await?;
        self.cache_store(path, body.clone(), expiry);
        Ok(body)
    }

    fn cache_get(&self, path: &str) -> Option<Value> {
        let entry = self.cache.get(path)?;
        (Instant::now() < entry.expires_at).then(|| entry.body.clone())
    }

    fn cache_store(&self, path: &str, body: Value, expiry: Duration) {
        if self.cache.len() >= MAX_CACHE_ENTRIES {
            self.cache.clear();
        }
        self.cache.insert(
            path.to_string(),
            CacheEntry {
                body,
                expires_at: Instant::now() + expiry,
            },
        );
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        Ok(self.request(Method::POST, path, Some(body)).await?.body)
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        Ok(self.request(Method::PATCH, path, Some(body)).await?.body)
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<u16, ApiError> {
        Ok(self.request(Method::PUT, path, Some(body)).await?.status)
    }

    pub async fn delete(&self, path: &str) -> Result<u16, ApiError> {
        Ok(self.request(Method::DELETE, path, None).await?.status)
    }
}

#[async_trait]
impl Api for RestClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bot {}", self.token));

        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status,
                method,
                path: path.to_string(),
                body,
            });
        }

        // Some endpoints answer 204 with an empty body.
        let text = response.text().await?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })?
        };

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiSection;

    fn client() -> RestClient {
        RestClient::new("test-token", &ApiSection::default()).unwrap()
    }

    #[test]
    fn test_error_classification() {
        let forbidden = ApiError::Status {
            status: 403,
            method: Method::POST,
            path: "/guilds/1/bans/2".into(),
            body: String::new(),
        };
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_not_found());

        let missing = ApiError::Status {
            status: 404,
            method: Method::GET,
            path: "/guilds/1/members/2".into(),
            body: String::new(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_forbidden());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_entry_expires() {
        let client = client();
        client.cache_store("/route", serde_json::json!({"ok": true}), DEFAULT_CACHE_EXPIRY);

        assert!(client.cache_get("/route").is_some());

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(client.cache_get("/route").is_none());
    }

    #[tokio::test]
    async fn test_cache_clears_on_overflow() {
        let client = client();
        for i in 0..MAX_CACHE_ENTRIES {
            client.cache_store(&format!("/route/{i}"), Value::Null, DEFAULT_CACHE_EXPIRY);
        }
        assert_eq!(client.cache.len(), MAX_CACHE_ENTRIES);

        client.cache_store("/route/new", Value::Null, DEFAULT_CACHE_EXPIRY);
        assert_eq!(client.cache.len(), 1);
        assert!(client.cache_get("/route/new").is_some());
        assert!(client.cache_get("/route/0").is_none());
    }
}
