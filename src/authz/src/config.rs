//! Configuration for the authorization engine

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Default TTL for cached token introspection results
pub const DEFAULT_TOKEN_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default TTL for cached sessions
pub const DEFAULT_SESSION_CACHE_TTL: Duration = Duration::from_secs(3);

/// Default number of entries for each cache
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default timeout for calls to the identity provider
pub const DEFAULT_INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration value {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Cache configuration
///
/// A capacity of zero disables the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,

    /// Time-to-live for cached entries
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }

    /// Token introspection cache with the default TTL
    pub fn token(capacity: usize) -> Self {
        Self::new(capacity, DEFAULT_TOKEN_CACHE_TTL)
    }

    /// Session cache with the default TTL
    pub fn session(capacity: usize) -> Self {
        Self::new(capacity, DEFAULT_SESSION_CACHE_TTL)
    }

    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    fn validate(&self, key: &'static str) -> Result<(), ConfigError> {
        if self.is_enabled() && self.ttl.is_zero() {
            return Err(ConfigError::Invalid {
                key,
                reason: "ttl must be positive when the cache is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Address the demo server listens on
    pub listen_addr: SocketAddr,

    /// Root URL of the identity provider
    pub idp_url: String,

    /// Client credentials used to authenticate introspection calls
    pub client_id: String,
    pub client_secret: String,

    /// Timeout for calls to the identity provider
    pub introspection_timeout: Duration,

    pub token_cache: CacheConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            idp_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            introspection_timeout: DEFAULT_INTROSPECTION_TIMEOUT,
            token_cache: CacheConfig::token(DEFAULT_CACHE_CAPACITY),
        }
    }
}

impl AuthzConfig {
    /// Loads configuration from environment variables
    ///
    /// - `IDP_URL`, `IDP_CLIENT_ID`, `IDP_CLIENT_SECRET` (required)
    /// - `PORT` (default 8080)
    /// - `INTROSPECTION_TIMEOUT_MS`
    /// - `TOKEN_CACHE_SIZE`, `TOKEN_CACHE_TTL_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.idp_url = lookup("IDP_URL").ok_or(ConfigError::Missing("IDP_URL"))?;
        config.client_id = lookup("IDP_CLIENT_ID").ok_or(ConfigError::Missing("IDP_CLIENT_ID"))?;
        config.client_secret =
            lookup("IDP_CLIENT_SECRET").ok_or(ConfigError::Missing("IDP_CLIENT_SECRET"))?;

        if let Some(port) = parse_var::<u16, _>(&lookup, "PORT")? {
            config.listen_addr.set_port(port);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "INTROSPECTION_TIMEOUT_MS")? {
            config.introspection_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var(&lookup, "TOKEN_CACHE_SIZE")? {
            config.token_cache.capacity = size;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "TOKEN_CACHE_TTL_SECS")? {
            config.token_cache.ttl = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.idp_url.starts_with("http://") || self.idp_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "IDP_URL",
                reason: format!("{:?} is not an http(s) URL", self.idp_url),
            });
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing("IDP_CLIENT_ID"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Missing("IDP_CLIENT_SECRET"));
        }
        if self.introspection_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "INTROSPECTION_TIMEOUT_MS",
                reason: "timeout must be positive".to_string(),
            });
        }
        self.token_cache.validate("TOKEN_CACHE_TTL_SECS")?;
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("IDP_URL", "https://accounts.example.com"),
        ("IDP_CLIENT_ID", "client"),
        ("IDP_CLIENT_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = AuthzConfig::from_lookup(lookup_from(REQUIRED)).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.token_cache.ttl, Duration::from_secs(30));
        assert!(config.token_cache.is_enabled());
        assert_eq!(CacheConfig::session(1).ttl, Duration::from_secs(3));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PORT", "9090"),
            ("TOKEN_CACHE_SIZE", "0"),
            ("TOKEN_CACHE_TTL_SECS", "10"),
            ("INTROSPECTION_TIMEOUT_MS", "250"),
        ]);
        let config = AuthzConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.listen_addr.port(), 9090);
        assert!(!config.token_cache.is_enabled());
        assert_eq!(config.token_cache.ttl, Duration::from_secs(10));
        assert_eq!(config.introspection_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let err = AuthzConfig::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("IDP_URL"));

        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "not-a-port"));
        let err = AuthzConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_CACHE_TTL_SECS", "0"));
        assert!(AuthzConfig::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = AuthzConfig {
            idp_url: "ftp://accounts".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            ..AuthzConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
