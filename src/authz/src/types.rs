//! Core types shared across the authorization engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scopes;

/// The identity provider's verdict on a bearer token
///
/// A result with `active == false` must be rejected whatever else it
/// carries: the identity provider answers successfully for tokens it issued
/// that have since been revoked or expired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResult {
    /// Issued by the identity provider, not revoked, not expired
    pub active: bool,

    /// Scopes granted to the token
    pub scopes: Scopes,

    /// Client the token was issued to
    pub client_id: String,

    /// User the token acts on behalf of; `None` for machine credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// When the token expires
    pub expires_at: DateTime<Utc>,
}

impl IntrospectionResult {
    /// An active machine-credential result
    pub fn active(
        client_id: impl Into<String>,
        scopes: Scopes,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            active: true,
            scopes,
            client_id: client_id.into(),
            user_id: None,
            expires_at,
        }
    }

    /// An inactive result with no grants
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Binds the token to a user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns whether `expires_at` has passed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns whether the token was delegated by a human user
    pub fn is_user_token(&self) -> bool {
        self.user_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_user_token_detection() {
        let now = Utc::now();
        let machine = IntrospectionResult::active("client", Scopes::default(), now);
        assert!(!machine.is_user_token());
        assert!(!machine.clone().with_user("").is_user_token());
        assert!(machine.with_user("user-1").is_user_token());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let result = IntrospectionResult::active("client", Scopes::default(), now);
        assert!(result.is_expired_at(now));
        assert!(!result.is_expired_at(now - Duration::seconds(1)));
        assert!(!IntrospectionResult::inactive().active);
    }
}
