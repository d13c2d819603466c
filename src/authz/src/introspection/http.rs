//! Token introspection over HTTP
//!
//! Posts the token to `{root}/oauth/introspect` as a form body, authenticated
//! with the caller's client credentials, and decodes the JSON answer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{IntrospectionError, TokenIntrospector};
use crate::scope::Scopes;
use crate::types::IntrospectionResult;

/// Wire format of the introspection endpoint
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    /// Space-separated list
    #[serde(default)]
    scope: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    user_id: Option<String>,
    /// Unix timestamp
    #[serde(default)]
    exp: i64,
}

impl IntrospectionResponse {
    fn into_result(self) -> Result<IntrospectionResult, IntrospectionError> {
        let expires_at = DateTime::from_timestamp(self.exp, 0).ok_or_else(|| {
            IntrospectionError::Decode(format!("exp {} out of range", self.exp))
        })?;

        Ok(IntrospectionResult {
            active: self.active,
            scopes: self.scope.split_whitespace().collect::<Scopes>(),
            client_id: self.client_id,
            user_id: self.user_id.filter(|id| !id.is_empty()),
            expires_at,
        })
    }
}

/// Introspects tokens against the identity provider's HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpTokenIntrospector {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl HttpTokenIntrospector {
    pub fn new(
        root_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IntrospectionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntrospectionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/oauth/introspect", root_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TokenIntrospector for HttpTokenIntrospector {
    async fn introspect_token(&self, token: &str) -> Result<IntrospectionResult, IntrospectionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IntrospectionError::DeadlineExceeded
                } else {
                    IntrospectionError::Transport(e.to_string())
                }
            })?;

        if response.status() != StatusCode::OK {
            return Err(IntrospectionError::Status(response.status().as_u16()));
        }

        response
            .json::<IntrospectionResponse>()
            .await
            .map_err(|e| IntrospectionError::Decode(e.to_string()))?
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_response() {
        let json = r#"{
            "active": true,
            "scope": "openid profile sams::user::read",
            "client_id": "sams_cid_123",
            "exp": 1700000000
        }"#;
        let response: IntrospectionResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result().unwrap();

        assert!(result.active);
        assert_eq!(
            result.scopes.to_strings(),
            vec!["openid", "profile", "sams::user::read"]
        );
        assert_eq!(result.client_id, "sams_cid_123");
        assert_eq!(result.expires_at.timestamp(), 1_700_000_000);
        assert!(result.user_id.is_none());
    }

    #[test]
    fn test_decode_inactive_response() {
        let response: IntrospectionResponse = serde_json::from_str(r#"{"active":false}"#).unwrap();
        let result = response.into_result().unwrap();

        assert!(!result.active);
        assert!(result.scopes.is_empty());
    }

    #[test]
    fn test_empty_user_id_is_machine_token() {
        let response: IntrospectionResponse =
            serde_json::from_str(r#"{"active":true,"user_id":"","exp":1}"#).unwrap();
        assert!(!response.into_result().unwrap().is_user_token());
    }

    #[test]
    fn test_endpoint_joins_root_url() {
        let introspector =
            HttpTokenIntrospector::new("https://accounts.example.com/", "id", "secret", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            introspector.endpoint(),
            "https://accounts.example.com/oauth/introspect"
        );
    }
}
