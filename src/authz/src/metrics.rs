//! Counters for enforcement outcomes

use parking_lot::RwLock;

/// How an enforcement decision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    /// Missing, malformed, or inactive credential
    Unauthenticated,
    /// Credential valid but not permitted
    Forbidden,
    Canceled,
    Internal,
}

/// Snapshot of enforcement counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthzMetricsSnapshot {
    pub total_requests: u64,
    pub admitted: u64,
    pub unauthenticated: u64,
    pub forbidden: u64,
    pub canceled: u64,
    pub internal_errors: u64,
    pub token_cache_hits: u64,
    pub token_cache_misses: u64,
}

impl AuthzMetricsSnapshot {
    /// Fraction of requests that were admitted
    pub fn admit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.admitted as f64 / self.total_requests as f64
        }
    }

    /// Calculate token cache hit rate
    pub fn token_cache_hit_rate(&self) -> f64 {
        let total = self.token_cache_hits + self.token_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.token_cache_hits as f64 / total as f64
        }
    }
}

/// Enforcement metrics collector
#[derive(Debug, Default)]
pub struct AuthzMetrics {
    inner: RwLock<AuthzMetricsSnapshot>,
}

impl AuthzMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        let mut metrics = self.inner.write();
        metrics.total_requests += 1;
        match outcome {
            Outcome::Admitted => metrics.admitted += 1,
            Outcome::Unauthenticated => metrics.unauthenticated += 1,
            Outcome::Forbidden => metrics.forbidden += 1,
            Outcome::Canceled => metrics.canceled += 1,
            Outcome::Internal => metrics.internal_errors += 1,
        }
    }

    pub fn record_token_lookup(&self, from_cache: bool) {
        let mut metrics = self.inner.write();
        if from_cache {
            metrics.token_cache_hits += 1;
        } else {
            metrics.token_cache_misses += 1;
        }
    }

    pub fn snapshot(&self) -> AuthzMetricsSnapshot {
        self.inner.read().clone()
    }

    pub fn reset(&self) {
        *self.inner.write() = AuthzMetricsSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let metrics = AuthzMetrics::new();
        metrics.record_outcome(Outcome::Admitted);
        metrics.record_outcome(Outcome::Forbidden);
        metrics.record_outcome(Outcome::Unauthenticated);
        metrics.record_outcome(Outcome::Admitted);
        metrics.record_token_lookup(true);
        metrics.record_token_lookup(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.admitted, 2);
        assert_eq!(snapshot.admit_rate(), 0.5);
        assert_eq!(snapshot.token_cache_hit_rate(), 0.5);

        metrics.reset();
        assert_eq!(metrics.snapshot(), AuthzMetricsSnapshot::default());
    }
}
