//! Request-scoped identity of an authenticated client

use axum::http::Extensions;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scope::Scopes;
use crate::types::IntrospectionResult;

/// The authenticated caller, attached to the request after a successful
/// authorization check so handlers can read it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub client_id: String,
    pub token_expires_at: DateTime<Utc>,
    pub token_scopes: Scopes,
}

impl ClientInfo {
    pub fn from_introspection(result: &IntrospectionResult) -> Self {
        Self {
            client_id: result.client_id.clone(),
            token_expires_at: result.expires_at,
            token_scopes: result.scopes.clone(),
        }
    }

    /// Reads the client info attached to a request
    pub fn from_extensions(extensions: &Extensions) -> Option<&ClientInfo> {
        extensions.get::<ClientInfo>()
    }

    pub(crate) fn attach(self, extensions: &mut Extensions) {
        extensions.insert(self);
    }
}
