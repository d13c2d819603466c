//! Session lookups with a short-lived cache
//!
//! Sessions change state (sign-in, sign-out) far more often than tokens do,
//! so cached sessions live only seconds. Signing a session out through this
//! service drops its cache entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheStats, ExpiringLru};
use crate::config::CacheConfig;
use crate::introspection::Lookup;
use crate::telemetry::{keys, TelemetrySink, TraceRecord};

/// Trace record names for session calls
pub const GET_SESSION_SPAN: &str = "sessions.get_session_by_id";
pub const SIGN_OUT_SESSION_SPAN: &str = "sessions.sign_out_session";

/// The user a session is authenticated as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

/// An identity-provider session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Set only when the session is authenticated by a user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Session lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    /// The session is authenticated by a different user than the one given
    #[error("session belongs to a different user")]
    RecordMismatch,

    #[error("session request aborted")]
    Aborted,

    #[error("session request canceled")]
    Canceled,

    #[error("session service error: {0}")]
    Remote(String),
}

/// Remote session API
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn get_session(&self, id: &str) -> Result<Session, SessionError>;

    /// Revokes the authenticated state of a session. Succeeds when the
    /// session does not exist or is not authenticated.
    async fn sign_out_session(&self, session_id: &str, user_id: &str) -> Result<(), SessionError>;
}

/// Session service with optional caching
pub struct SessionsService {
    remote: Arc<dyn SessionClient>,
    cache: Option<ExpiringLru<String, Session>>,
    /// Bumped on every successful sign-out
    sign_outs: AtomicU64,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SessionsService {
    pub fn new(
        remote: Arc<dyn SessionClient>,
        config: &CacheConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            remote,
            cache: ExpiringLru::new(config),
            sign_outs: AtomicU64::new(0),
            telemetry,
        }
    }

    /// Returns the session with the given ID
    ///
    /// Fails with [`SessionError::NotFound`] if no such session exists, and
    /// with [`SessionError::Canceled`] if `cancellation` fires while the
    /// remote call is in flight.
    pub async fn get_session_by_id(
        &self,
        id: &str,
        cancellation: &CancellationToken,
    ) -> Result<Lookup<Session>, SessionError> {
        let mut record = TraceRecord::new(GET_SESSION_SPAN);

        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&id.to_string())) {
            record.set_bool(keys::SESSION_FROM_CACHE, true);
            record.mark_ok();
            self.telemetry.record(record);
            return Ok(Lookup {
                value: cached,
                from_cache: true,
            });
        }
        record.set_bool(keys::SESSION_FROM_CACHE, false);

        let epoch = self.sign_outs.load(Ordering::SeqCst);
        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(SessionError::Canceled),
            result = self.remote.get_session(id) => result,
        };

        match result {
            Ok(session) => {
                if let Some(cache) = &self.cache {
                    cache.insert(id.to_string(), session.clone());
                    // A sign-out that overlapped the fetch may have evicted
                    // before this insert
                    if self.sign_outs.load(Ordering::SeqCst) != epoch {
                        cache.remove(&id.to_string());
                    }
                }
                record.mark_ok();
                self.telemetry.record(record);
                Ok(Lookup {
                    value: session,
                    from_cache: false,
                })
            }
            Err(err) => {
                self.record_failure(record, &err, "unable to get session");
                Err(err)
            }
        }
    }

    /// Signs the session out for the given user
    ///
    /// Fails with [`SessionError::RecordMismatch`] if the session is
    /// authenticated by a different user. The cached copy is dropped only
    /// once the remote call succeeds; a canceled call leaves it in place.
    pub async fn sign_out_session(
        &self,
        session_id: &str,
        user_id: &str,
        cancellation: &CancellationToken,
    ) -> Result<(), SessionError> {
        let mut record = TraceRecord::new(SIGN_OUT_SESSION_SPAN);

        let result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(SessionError::Canceled),
            result = self.remote.sign_out_session(session_id, user_id) => result,
        };
        if let Err(err) = result {
            self.record_failure(record, &err, "unable to sign out session");
            return Err(err);
        }

        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.cache {
            if cache.remove(&session_id.to_string()).is_some() {
                debug!(session_id, "evicted signed-out session from cache");
            }
        }

        record.mark_ok();
        self.telemetry.record(record);
        Ok(())
    }

    fn record_failure(&self, mut record: TraceRecord, err: &SessionError, safe_message: &str) {
        record.mark_error(err.to_string(), safe_message);
        self.telemetry.record(record);
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ExpiringLru::stats)
    }
}
