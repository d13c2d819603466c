//! Error types for the authorization engine

use thiserror::Error;

use crate::config::ConfigError;
use crate::introspection::IntrospectionError;
use crate::scope::ScopeError;
use crate::session::SessionError;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Scope failed validation
    #[error("Invalid scope: {0}")]
    InvalidScope(#[from] ScopeError),

    /// Endpoint or engine misconfiguration, raised at setup time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid or missing configuration value
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Token introspection collaborator failed
    #[error("Introspection error: {0}")]
    Introspection(#[from] IntrospectionError),

    /// Session collaborator failed
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
