//! Scope enforcement for RPC handlers
//!
//! Each procedure declares the scopes it requires in a registry
//! ([`EndpointScopes`]). [`ScopeInterceptor`] checks incoming handler calls
//! against that declaration before they reach the handler and attaches the
//! authenticated [`ClientInfo`] to the call's extensions. Client-side calls
//! pass through untouched.
//!
//! Streaming handlers are wrapped the same way as unary ones, with the
//! stream carried in [`RpcRequest::message`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::{Extensions, HeaderMap};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{Authorizer, CredentialPolicy, Rejection, RequiredScopes, REQUIRE_SCOPES_SPAN};
use crate::context::ClientInfo;
use crate::error::Result;
use crate::metrics::Outcome;
use crate::scope::Scope;
use crate::telemetry::{keys, TraceRecord};

/// RPC status codes produced by enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Canceled,
    Unauthenticated,
    PermissionDenied,
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Canceled => "canceled",
            Code::Unauthenticated => "unauthenticated",
            Code::PermissionDenied => "permission_denied",
            Code::Internal => "internal",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned to the RPC caller; the message never carries internal
/// details
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    code: Code,
    message: String,
}

impl RpcStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Describes the procedure being called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    /// Fully qualified procedure name, e.g. `/accounts.v1.UsersService/GetUser`
    pub procedure: String,
    /// True when this side of the call is the client
    pub is_client: bool,
}

impl CallSpec {
    pub fn handler(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            is_client: false,
        }
    }

    pub fn client(procedure: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            is_client: true,
        }
    }
}

/// An RPC call as seen by the interceptor
#[derive(Debug)]
pub struct RpcRequest<T> {
    pub spec: CallSpec,
    pub headers: HeaderMap,
    pub extensions: Extensions,
    pub cancellation: CancellationToken,
    pub message: T,
}

impl<T> RpcRequest<T> {
    pub fn new(spec: CallSpec, message: T) -> Self {
        Self {
            spec,
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            cancellation: CancellationToken::new(),
            message,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The authenticated client, once the interceptor has admitted the call
    pub fn client_info(&self) -> Option<&ClientInfo> {
        ClientInfo::from_extensions(&self.extensions)
    }
}

/// Source of per-procedure scope declarations
pub trait EndpointScopes: Send + Sync {
    fn required_scopes(&self, procedure: &str) -> Option<RequiredScopes>;
}

/// Static map of procedure to required scopes
#[derive(Debug, Clone, Default)]
pub struct MethodScopes {
    methods: HashMap<String, RequiredScopes>,
}

impl MethodScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the scopes a procedure requires
    ///
    /// Fails when `scopes` is empty or contains a malformed scope.
    pub fn register<I, S>(mut self, procedure: impl Into<String>, scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        self.methods
            .insert(procedure.into(), RequiredScopes::new(scopes)?);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl EndpointScopes for MethodScopes {
    fn required_scopes(&self, procedure: &str) -> Option<RequiredScopes> {
        self.methods.get(procedure).cloned()
    }
}

/// Checks required scopes on incoming RPC calls
#[derive(Clone)]
pub struct ScopeInterceptor {
    authorizer: Arc<Authorizer>,
    endpoints: Arc<dyn EndpointScopes>,
    policy: CredentialPolicy,
}

impl ScopeInterceptor {
    /// Accepts machine and user-delegated tokens unless configured otherwise
    pub fn new(authorizer: Arc<Authorizer>, endpoints: Arc<dyn EndpointScopes>) -> Self {
        Self {
            authorizer,
            endpoints,
            policy: CredentialPolicy::AnyCredential,
        }
    }

    pub fn with_credential_policy(mut self, policy: CredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the check and, when admitted, attaches [`ClientInfo`] to the
    /// request
    pub async fn intercept<T>(&self, request: &mut RpcRequest<T>) -> std::result::Result<(), RpcStatus> {
        if request.spec.is_client {
            return Ok(());
        }

        let procedure = request.spec.procedure.as_str();
        let mut record = TraceRecord::new(REQUIRE_SCOPES_SPAN);
        record.set_string(keys::TRANSPORT, "rpc");
        record.set_string(keys::PROCEDURE, procedure);

        let Some(required) = self.endpoints.required_scopes(procedure) else {
            let safe_msg = "internal schema error";
            error!(procedure, code = %Code::Internal, "{safe_msg}: no required scopes declared");
            record.mark_error(format!("no required scopes declared for {procedure}"), safe_msg);
            self.authorizer.record(record);
            self.authorizer.record_outcome(Outcome::Internal);
            return Err(RpcStatus::new(Code::Internal, safe_msg));
        };

        match self
            .authorizer
            .authorize(&request.headers, &required, self.policy, &request.cancellation, record)
            .await
        {
            Ok(info) => {
                info.attach(&mut request.extensions);
                Ok(())
            }
            Err(rejection) => Err(to_status(&request.spec, &rejection)),
        }
    }

    /// Runs the check, then `next` if the call is admitted
    pub async fn wrap<T, R, F, Fut>(
        &self,
        mut request: RpcRequest<T>,
        next: F,
    ) -> std::result::Result<R, RpcStatus>
    where
        F: FnOnce(RpcRequest<T>) -> Fut,
        Fut: Future<Output = std::result::Result<R, RpcStatus>>,
    {
        self.intercept(&mut request).await?;
        next(request).await
    }
}

fn to_status(spec: &CallSpec, rejection: &Rejection) -> RpcStatus {
    let procedure = spec.procedure.as_str();
    let safe_msg = rejection.safe_message();

    match rejection {
        Rejection::InvalidCredential(err) => {
            warn!(procedure, error = %err, "error extracting bearer token");
            RpcStatus::new(Code::Unauthenticated, safe_msg)
        }
        Rejection::Introspection(err) if err.is_canceled() => {
            warn!(procedure, code = %Code::Canceled, error = %err, "{safe_msg}");
            RpcStatus::new(Code::Canceled, safe_msg)
        }
        Rejection::Introspection(err) => {
            error!(procedure, code = %Code::Internal, error = %err, "{safe_msg}");
            RpcStatus::new(Code::Internal, safe_msg)
        }
        Rejection::InactiveToken { client_id } => {
            warn!(procedure, client = %client_id, "attempt to authenticate with inactive token");
            RpcStatus::new(Code::PermissionDenied, safe_msg)
        }
        Rejection::UserToken { client_id, user_id } => {
            warn!(
                procedure,
                client = %client_id,
                user_id = %user_id,
                "attempt to authenticate using token with user ID"
            );
            RpcStatus::new(Code::PermissionDenied, safe_msg)
        }
        Rejection::InsufficientScope {
            client_id,
            granted,
            missing,
            ..
        } => {
            warn!(
                procedure,
                client = %client_id,
                got_scopes = ?granted,
                required_scope = %missing,
                "attempt to authenticate using token without required scope"
            );
            RpcStatus::new(Code::PermissionDenied, safe_msg)
        }
    }
}
