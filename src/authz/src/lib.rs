//! # Accounts Authorization Engine
//!
//! Scope-based authorization for service-to-service calls.
//!
//! ## Features
//!
//! - **Hierarchical scopes**: `service::permission::action`, where a broad
//!   permission covers its dot-separated specializations
//! - **Alias scopes** for the standard identity claims
//! - **Token introspection** against the identity provider, with a bounded
//!   TTL cache keyed by BLAKE3 token digests
//! - **Session lookups** with a short-lived cache and sign-out eviction
//! - **Enforcement** for RPC handlers and axum routes, with structured
//!   trace records and outcome metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use accounts_authz::scope::PROFILE;
//! use accounts_authz::{
//!     Authorizer, CacheConfig, CachedIntrospector, HttpAuthenticator, HttpTokenIntrospector,
//!     RequiredScopes, TracingSink,
//! };
//! use axum::{routing::get, Router};
//!
//! fn router(remote: HttpTokenIntrospector) -> accounts_authz::Result<Router> {
//!     let introspector = CachedIntrospector::new(Arc::new(remote), &CacheConfig::token(10_000));
//!     let authorizer = Arc::new(Authorizer::new(introspector, Arc::new(TracingSink)));
//!
//!     let protected = Router::new().route("/v1/whoami", get(|| async { "ok" }));
//!     let required = RequiredScopes::new([PROFILE])?;
//!     Ok(HttpAuthenticator::new(authorizer).require_scopes(protected, required))
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod enforcement;
pub mod error;
pub mod introspection;
pub mod metrics;
pub mod scope;
pub mod session;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, ExpiringLru};
pub use config::{AuthzConfig, CacheConfig, ConfigError};
pub use context::ClientInfo;
pub use enforcement::{
    Authorizer, CredentialPolicy, HttpAuthenticator, HttpRejection, MethodScopes, Rejection,
    RequiredScopes, RpcStatus, ScopeInterceptor,
};
pub use error::{AuthzError, Result};
pub use introspection::{
    CachedIntrospector, HttpTokenIntrospector, IntrospectionError, Lookup, TokenIntrospector,
};
pub use metrics::{AuthzMetrics, AuthzMetricsSnapshot, Outcome};
pub use scope::{strategy, Scope, ScopeError, Scopes};
pub use session::{Session, SessionClient, SessionError, SessionUser, SessionsService};
pub use telemetry::{MemorySink, TelemetrySink, TraceRecord, TracingSink};
pub use types::IntrospectionResult;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
