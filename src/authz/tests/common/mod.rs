//! Shared fixtures for enforcement tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use accounts_authz::{
    Authorizer, CacheConfig, CachedIntrospector, IntrospectionError, IntrospectionResult,
    MemorySink, Scopes, TokenIntrospector,
};
use async_trait::async_trait;
use chrono::Utc;

/// Introspector answering from a fixed token table
#[derive(Default)]
pub struct StaticIntrospector {
    tokens: HashMap<String, IntrospectionResult>,
    failure: Option<IntrospectionError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, result: IntrospectionResult) -> Self {
        self.tokens.insert(token.to_string(), result);
        self
    }

    /// Every call fails with `err`
    pub fn failing(mut self, err: IntrospectionError) -> Self {
        self.failure = Some(err);
        self
    }

    /// Every call waits `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIntrospector for StaticIntrospector {
    async fn introspect_token(&self, token: &str) -> Result<IntrospectionResult, IntrospectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        // Unknown tokens are reported inactive, as the identity provider does
        Ok(self
            .tokens
            .get(token)
            .cloned()
            .unwrap_or_else(IntrospectionResult::inactive))
    }
}

/// Active machine token expiring in an hour
pub fn machine_token(client_id: &str, scopes: &[&str]) -> IntrospectionResult {
    IntrospectionResult::active(
        client_id,
        scopes.iter().copied().collect::<Scopes>(),
        Utc::now() + chrono::Duration::hours(1),
    )
}

/// Authorizer with a small token cache, recording into `sink`
pub fn authorizer(introspector: Arc<StaticIntrospector>, sink: Arc<MemorySink>) -> Arc<Authorizer> {
    let cached = CachedIntrospector::new(introspector, &CacheConfig::token(100));
    Arc::new(Authorizer::new(cached, sink))
}
