//! Token introspection and its cache
//!
//! The identity provider is reached through [`TokenIntrospector`]. Wrapping it
//! in [`CachedIntrospector`] reuses results for repeated presentations of the
//! same token. A cached result is only served while the token itself is
//! unexpired, and only active, unexpired results are stored.

use std::sync::Arc;

use async_trait::async_trait;
use blake3::Hasher;
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheStats, ExpiringLru};
use crate::config::CacheConfig;
use crate::types::IntrospectionResult;

pub mod http;

pub use http::HttpTokenIntrospector;

/// Introspection failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    /// The caller went away before the identity provider answered
    #[error("introspection canceled")]
    Canceled,

    #[error("introspection timed out")]
    DeadlineExceeded,

    #[error("introspection request failed: {0}")]
    Transport(String),

    #[error("unexpected introspection response status {0}")]
    Status(u16),

    #[error("malformed introspection response: {0}")]
    Decode(String),
}

impl IntrospectionError {
    /// Returns whether the failure stems from the caller canceling
    pub fn is_canceled(&self) -> bool {
        matches!(self, IntrospectionError::Canceled)
    }
}

/// Asks the identity provider about a bearer token
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn introspect_token(&self, token: &str) -> Result<IntrospectionResult, IntrospectionError>;
}

#[async_trait]
impl<T: TokenIntrospector + ?Sized> TokenIntrospector for Arc<T> {
    async fn introspect_token(&self, token: &str) -> Result<IntrospectionResult, IntrospectionError> {
        (**self).introspect_token(token).await
    }
}

/// A value together with whether it was served from cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<T> {
    pub value: T,
    pub from_cache: bool,
}

/// Cache key: BLAKE3 digest of the raw token
type TokenKey = [u8; 32];

fn token_key(token: &str) -> TokenKey {
    let mut hasher = Hasher::new();
    hasher.update(token.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Introspector that caches results of another introspector
pub struct CachedIntrospector {
    remote: Arc<dyn TokenIntrospector>,
    cache: Option<ExpiringLru<TokenKey, IntrospectionResult>>,
}

impl CachedIntrospector {
    /// Wraps `remote`; a zero-capacity config leaves caching disabled
    pub fn new(remote: Arc<dyn TokenIntrospector>, config: &CacheConfig) -> Self {
        Self {
            remote,
            cache: ExpiringLru::new(config),
        }
    }

    /// Wraps `remote` without caching
    pub fn uncached(remote: Arc<dyn TokenIntrospector>) -> Self {
        Self {
            remote,
            cache: None,
        }
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Introspects `token`, serving an unexpired cached result when present
    pub async fn lookup(
        &self,
        token: &str,
    ) -> Result<Lookup<IntrospectionResult>, IntrospectionError> {
        let Some(cache) = &self.cache else {
            let value = self.remote.introspect_token(token).await?;
            return Ok(Lookup {
                value,
                from_cache: false,
            });
        };

        let key = token_key(token);
        if let Some(cached) = cache.get(&key) {
            if !cached.is_expired_at(Utc::now()) {
                return Ok(Lookup {
                    value: cached,
                    from_cache: true,
                });
            }
            cache.remove(&key);
        }

        let value = self.remote.introspect_token(token).await?;
        if value.active && !value.is_expired_at(Utc::now()) {
            cache.insert(key, value.clone());
        } else {
            debug!(
                client_id = %value.client_id,
                active = value.active,
                "not caching introspection result"
            );
        }

        Ok(Lookup {
            value,
            from_cache: false,
        })
    }

    /// Drops expired cache entries; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        self.cache.as_ref().map_or(0, ExpiringLru::purge_expired)
    }

    /// Statistics for the token cache, if enabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ExpiringLru::stats)
    }
}

#[async_trait]
impl TokenIntrospector for CachedIntrospector {
    async fn introspect_token(&self, token: &str) -> Result<IntrospectionResult, IntrospectionError> {
        self.lookup(token).await.map(|lookup| lookup.value)
    }
}
