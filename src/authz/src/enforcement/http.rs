//! Scope enforcement for HTTP routes
//!
//! `require_scopes` is an axum middleware: it answers 401 when the request
//! has no usable active token and 403 when the token may not use the route,
//! and otherwise forwards the request with [`ClientInfo`] in its extensions.
//!
//! Callers that want a disconnect to abort introspection put a
//! [`CancellationToken`] in the request extensions.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{Authorizer, CredentialPolicy, Rejection, RequiredScopes, REQUIRE_SCOPES_SPAN};
use crate::context::ClientInfo;
use crate::telemetry::{keys, TraceRecord};

/// Plain-text responses for refused requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRejection {
    Unauthorized,
    InactiveToken,
    UserTokensNotAllowed,
    MissingScope,
    BadRequest,
    Internal,
}

impl HttpRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpRejection::Unauthorized | HttpRejection::InactiveToken => StatusCode::UNAUTHORIZED,
            HttpRejection::UserTokensNotAllowed | HttpRejection::MissingScope => {
                StatusCode::FORBIDDEN
            }
            HttpRejection::BadRequest => StatusCode::BAD_REQUEST,
            HttpRejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            HttpRejection::Unauthorized => "Unauthorized",
            HttpRejection::InactiveToken => "Unauthorized: Inactive token",
            HttpRejection::UserTokensNotAllowed => "Forbidden: User tokens not allowed",
            HttpRejection::MissingScope => "Forbidden: Missing required scope",
            HttpRejection::BadRequest => "Bad Request",
            HttpRejection::Internal => "Internal Server Error",
        }
    }
}

impl IntoResponse for HttpRejection {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}

impl From<&Rejection> for HttpRejection {
    fn from(rejection: &Rejection) -> Self {
        match rejection {
            Rejection::InvalidCredential(_) => HttpRejection::Unauthorized,
            Rejection::Introspection(err) if err.is_canceled() => HttpRejection::BadRequest,
            Rejection::Introspection(_) => HttpRejection::Internal,
            Rejection::InactiveToken { .. } => HttpRejection::InactiveToken,
            Rejection::UserToken { .. } => HttpRejection::UserTokensNotAllowed,
            Rejection::InsufficientScope { .. } => HttpRejection::MissingScope,
        }
    }
}

/// Middleware state: what one route group requires
#[derive(Clone)]
pub struct RequireScopes {
    authorizer: Arc<Authorizer>,
    required: RequiredScopes,
    policy: CredentialPolicy,
}

impl RequireScopes {
    pub fn new(authorizer: Arc<Authorizer>, required: RequiredScopes, policy: CredentialPolicy) -> Self {
        Self {
            authorizer,
            required,
            policy,
        }
    }
}

/// Builds scope-checking layers for axum routers
#[derive(Clone)]
pub struct HttpAuthenticator {
    authorizer: Arc<Authorizer>,
    policy: CredentialPolicy,
}

impl HttpAuthenticator {
    /// Rejects user-bound tokens unless configured otherwise
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self {
            authorizer,
            policy: CredentialPolicy::MachineOnly,
        }
    }

    pub fn with_credential_policy(mut self, policy: CredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Protects every route currently in `router` with `required`
    pub fn require_scopes<S>(&self, router: Router<S>, required: RequiredScopes) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let state = RequireScopes::new(self.authorizer.clone(), required, self.policy);
        router.route_layer(middleware::from_fn_with_state(state, require_scopes))
    }
}

/// Checks the request against the route's required scopes
pub async fn require_scopes(
    State(state): State<RequireScopes>,
    mut request: Request,
    next: Next,
) -> Response {
    let cancellation = request
        .extensions()
        .get::<CancellationToken>()
        .cloned()
        .unwrap_or_else(CancellationToken::new);

    let mut record = TraceRecord::new(REQUIRE_SCOPES_SPAN);
    record.set_string(keys::TRANSPORT, "http");
    record.set_string(keys::PROCEDURE, request.uri().path());

    let result = state
        .authorizer
        .authorize(
            request.headers(),
            &state.required,
            state.policy,
            &cancellation,
            record,
        )
        .await;

    match result {
        Ok(info) => {
            info.attach(request.extensions_mut());
            next.run(request).await
        }
        Err(rejection) => {
            log_rejection(&rejection);
            HttpRejection::from(&rejection).into_response()
        }
    }
}

fn log_rejection(rejection: &Rejection) {
    match rejection {
        Rejection::InvalidCredential(err) => {
            warn!(error = %err, "error extracting bearer token");
        }
        Rejection::Introspection(err) if err.is_canceled() => {
            warn!(error = %err, "error introspecting token");
        }
        Rejection::Introspection(err) => {
            error!(error = %err, "error introspecting token");
        }
        Rejection::InactiveToken { client_id } => {
            warn!(client = %client_id, "attempt to authenticate with inactive token");
        }
        Rejection::UserToken { client_id, user_id } => {
            warn!(
                client = %client_id,
                user_id = %user_id,
                "attempt to authenticate using token with user ID"
            );
        }
        Rejection::InsufficientScope {
            client_id,
            granted,
            missing,
            ..
        } => {
            warn!(
                client = %client_id,
                got_scopes = ?granted,
                required_scope = %missing,
                "attempt to authenticate using token without required scope"
            );
        }
    }
}

/// Reads the authenticated client in a handler behind [`require_scopes`]
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for ClientInfo {
    type Rejection = HttpRejection;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        ClientInfo::from_extensions(&parts.extensions)
            .cloned()
            .ok_or(HttpRejection::Unauthorized)
    }
}
