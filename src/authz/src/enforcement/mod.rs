//! Request-time scope enforcement
//!
//! [`Authorizer`] runs the checks shared by every transport: extract the
//! bearer token, introspect it (through the token cache), reject inactive
//! credentials, optionally reject user-bound credentials, and require every
//! declared scope. The [`rpc`] and [`http`] adapters map its [`Rejection`]s
//! onto their own status vocabularies.

use std::sync::Arc;

use axum::http::HeaderMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStats;
use crate::context::ClientInfo;
use crate::error::{AuthzError, Result};
use crate::introspection::{CachedIntrospector, IntrospectionError};
use crate::metrics::{AuthzMetrics, AuthzMetricsSnapshot, Outcome};
use crate::scope::Scope;
use crate::telemetry::{keys, TelemetrySink, TraceRecord};

pub mod bearer;
pub mod http;
pub mod rpc;

pub use bearer::{extract_bearer, BearerError};
pub use http::{require_scopes, HttpAuthenticator, HttpRejection, RequireScopes};
pub use rpc::{CallSpec, Code, EndpointScopes, MethodScopes, RpcRequest, RpcStatus, ScopeInterceptor};

/// Name of the trace record emitted for each check
pub const REQUIRE_SCOPES_SPAN: &str = "authz.require_scopes";

/// Which credentials may pass a check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CredentialPolicy {
    /// Reject tokens bound to a human user
    #[default]
    MachineOnly,
    /// Accept machine and user-delegated tokens alike
    AnyCredential,
}

/// The scopes an endpoint demands; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredScopes(Arc<[Scope]>);

impl RequiredScopes {
    /// Declares the scopes an endpoint requires
    ///
    /// Fails when the list is empty or any scope is malformed, so a
    /// misdeclared endpoint is caught at setup rather than at request time.
    pub fn new<I, S>(scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        let scopes: Vec<Scope> = scopes.into_iter().map(Into::into).collect();
        if scopes.is_empty() {
            return Err(AuthzError::Configuration(
                "endpoint must declare at least one required scope".to_string(),
            ));
        }
        for scope in &scopes {
            scope.validate()?;
        }
        Ok(Self(scopes.into()))
    }

    pub fn as_slice(&self) -> &[Scope] {
        &self.0
    }

    pub fn to_strings(&self) -> Vec<String> {
        crate::scope::to_strings(&self.0)
    }
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("invalid authorization header: {0}")]
    InvalidCredential(#[from] BearerError),

    #[error("introspection failed: {0}")]
    Introspection(IntrospectionError),

    #[error("inactive token for client {client_id}")]
    InactiveToken { client_id: String },

    #[error("token for client {client_id} is bound to user {user_id}")]
    UserToken { client_id: String, user_id: String },

    #[error("got scopes {granted:?}, required: {required:?}")]
    InsufficientScope {
        client_id: String,
        granted: Vec<String>,
        required: Vec<String>,
        missing: String,
    },
}

impl Rejection {
    pub fn outcome(&self) -> Outcome {
        match self {
            Rejection::InvalidCredential(_) | Rejection::InactiveToken { .. } => {
                Outcome::Unauthenticated
            }
            Rejection::Introspection(err) if err.is_canceled() => Outcome::Canceled,
            Rejection::Introspection(_) => Outcome::Internal,
            Rejection::UserToken { .. } | Rejection::InsufficientScope { .. } => Outcome::Forbidden,
        }
    }

    /// Message safe to show the caller
    pub fn safe_message(&self) -> &'static str {
        match self {
            Rejection::InvalidCredential(_) => "invalid authorization header",
            Rejection::Introspection(_) => "unable to validate token",
            Rejection::InactiveToken { .. } => "permission denied",
            Rejection::UserToken { .. } => "user tokens not allowed",
            Rejection::InsufficientScope { .. } => "insufficient scope",
        }
    }
}

/// Runs scope checks against introspected tokens
pub struct Authorizer {
    introspector: CachedIntrospector,
    telemetry: Arc<dyn TelemetrySink>,
    metrics: AuthzMetrics,
}

impl Authorizer {
    pub fn new(introspector: CachedIntrospector, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            introspector,
            telemetry,
            metrics: AuthzMetrics::new(),
        }
    }

    /// Checks the request's credential against `required`
    ///
    /// `record` is completed with the token attributes and outcome and then
    /// handed to the telemetry sink. Cancelling `cancellation` while the
    /// identity provider is being consulted yields a canceled rejection.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        required: &RequiredScopes,
        policy: CredentialPolicy,
        cancellation: &CancellationToken,
        mut record: TraceRecord,
    ) -> std::result::Result<ClientInfo, Rejection> {
        record.set_strings(keys::REQUIRED_SCOPES, required.to_strings());

        let outcome = self
            .evaluate(headers, required, policy, cancellation, &mut record)
            .await;

        match &outcome {
            Ok(_) => {
                record.mark_ok();
                self.metrics.record_outcome(Outcome::Admitted);
            }
            Err(rejection) => {
                record.mark_error(rejection.to_string(), rejection.safe_message());
                self.metrics.record_outcome(rejection.outcome());
            }
        }
        self.telemetry.record(record);

        outcome
    }

    async fn evaluate(
        &self,
        headers: &HeaderMap,
        required: &RequiredScopes,
        policy: CredentialPolicy,
        cancellation: &CancellationToken,
        record: &mut TraceRecord,
    ) -> std::result::Result<ClientInfo, Rejection> {
        let token = extract_bearer(headers)?;

        let lookup = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(IntrospectionError::Canceled),
            result = self.introspector.lookup(token) => result,
        }
        .map_err(Rejection::Introspection)?;

        self.metrics.record_token_lookup(lookup.from_cache);
        record.set_bool(keys::TOKEN_FROM_CACHE, lookup.from_cache);

        let result = lookup.value;
        record.set_string(keys::CLIENT_ID, &result.client_id);
        record.set_string(keys::TOKEN_EXPIRES_AT, result.expires_at.to_rfc3339());
        record.set_strings(keys::TOKEN_SCOPES, result.scopes.to_strings());

        if !result.active {
            return Err(Rejection::InactiveToken {
                client_id: result.client_id,
            });
        }

        if policy == CredentialPolicy::MachineOnly && result.is_user_token() {
            return Err(Rejection::UserToken {
                client_id: result.client_id,
                user_id: result.user_id.unwrap_or_default(),
            });
        }

        if let Some(missing) = result.scopes.first_unsatisfied(required.as_slice()) {
            return Err(Rejection::InsufficientScope {
                client_id: result.client_id.clone(),
                granted: result.scopes.to_strings(),
                required: required.to_strings(),
                missing: missing.to_string(),
            });
        }

        Ok(ClientInfo::from_introspection(&result))
    }

    /// Hands a record that did not go through [`Authorizer::authorize`] to
    /// the telemetry sink
    pub(crate) fn record(&self, record: TraceRecord) {
        self.telemetry.record(record);
    }

    pub(crate) fn record_outcome(&self, outcome: Outcome) {
        self.metrics.record_outcome(outcome);
    }

    pub fn metrics(&self) -> AuthzMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn token_cache_stats(&self) -> Option<CacheStats> {
        self.introspector.cache_stats()
    }

    /// Drops expired entries from the token cache
    pub fn purge_expired_tokens(&self) -> usize {
        self.introspector.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::PROFILE;

    #[test]
    fn test_required_scopes_rejects_empty() {
        let err = RequiredScopes::new(Vec::<Scope>::new()).unwrap_err();
        assert!(matches!(err, AuthzError::Configuration(_)));
    }

    #[test]
    fn test_required_scopes_rejects_malformed() {
        let err = RequiredScopes::new(["sams::user"]).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidScope(_)));
    }

    #[test]
    fn test_required_scopes_accepts_aliases_and_structured() {
        let required = RequiredScopes::new([PROFILE, "sams::user.roles::read"]).unwrap();
        assert_eq!(required.to_strings(), vec!["profile", "sams::user.roles::read"]);
    }

    #[test]
    fn test_rejection_outcomes() {
        assert_eq!(
            Rejection::Introspection(IntrospectionError::Canceled).outcome(),
            Outcome::Canceled
        );
        assert_eq!(
            Rejection::Introspection(IntrospectionError::Status(502)).outcome(),
            Outcome::Internal
        );
        assert_eq!(
            Rejection::InvalidCredential(BearerError::Missing).outcome(),
            Outcome::Unauthenticated
        );
        assert_eq!(
            Rejection::InactiveToken {
                client_id: "c".to_string()
            }
            .outcome(),
            Outcome::Unauthenticated
        );
    }
}
