//! # Authorization Demo Server
//!
//! Serves a scope-protected route backed by the identity provider's token
//! introspection endpoint.
//!
//! ## Endpoints
//!
//! - `GET /v1/whoami` - Authenticated client info (requires `profile`)
//! - `GET /health` - Health check
//! - `GET /metrics` - Enforcement and cache counters in Prometheus format
//!
//! ## Configuration
//!
//! Environment variables:
//! - `IDP_URL`, `IDP_CLIENT_ID`, `IDP_CLIENT_SECRET` - Identity provider (required)
//! - `PORT` - HTTP server port (default: 8080)
//! - `TOKEN_CACHE_SIZE` - Token cache capacity, 0 disables (default: 10000)
//! - `TOKEN_CACHE_TTL_SECS` - Token cache TTL (default: 30)
//! - `RUST_LOG` - Log level (default: info)

use std::sync::Arc;
use std::time::{Duration, Instant};

use accounts_authz::scope::PROFILE;
use accounts_authz::{
    AuthzConfig, Authorizer, CachedIntrospector, ClientInfo, HttpAuthenticator,
    HttpTokenIntrospector, RequiredScopes, TracingSink,
};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    serve, Router,
};
use serde::Serialize;
use tokio::signal;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{debug, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// State shared by the open endpoints
#[derive(Clone)]
struct AppState {
    authorizer: Arc<Authorizer>,
    start_time: Instant,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// Prometheus text exposition
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// GET /v1/whoami - Echo the authenticated client
async fn whoami(client: ClientInfo) -> Json<ClientInfo> {
    info!(client_id = %client.client_id, "whoami");
    Json(client)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: accounts_authz::VERSION.to_string(),
    })
}

/// GET /metrics - enforcement and token cache counters
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let snapshot = state.authorizer.metrics();
    let cache = state.authorizer.token_cache_stats().unwrap_or_default();

    let metrics = format!(
        "# HELP authz_requests_total Requests checked, by outcome\n\
         # TYPE authz_requests_total counter\n\
         authz_requests_total{{outcome=\"admitted\"}} {}\n\
         authz_requests_total{{outcome=\"unauthenticated\"}} {}\n\
         authz_requests_total{{outcome=\"forbidden\"}} {}\n\
         authz_requests_total{{outcome=\"canceled\"}} {}\n\
         authz_requests_total{{outcome=\"internal\"}} {}\n\
         \n\
         # HELP authz_token_cache_entries Cached introspection results\n\
         # TYPE authz_token_cache_entries gauge\n\
         authz_token_cache_entries {}\n\
         \n\
         # HELP authz_token_cache_lookups_total Token cache lookups, by result\n\
         # TYPE authz_token_cache_lookups_total counter\n\
         authz_token_cache_lookups_total{{result=\"hit\"}} {}\n\
         authz_token_cache_lookups_total{{result=\"miss\"}} {}\n\
         \n\
         # HELP authz_uptime_seconds Server uptime in seconds\n\
         # TYPE authz_uptime_seconds gauge\n\
         authz_uptime_seconds {}\n",
        snapshot.admitted,
        snapshot.unauthenticated,
        snapshot.forbidden,
        snapshot.canceled,
        snapshot.internal_errors,
        cache.entries,
        cache.hits,
        cache.misses,
        state.start_time.elapsed().as_secs(),
    );

    MetricsResponse { metrics }
}

/// Routes: open health and metrics, scope-protected API
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let authenticator = HttpAuthenticator::new(state.authorizer.clone());
    let protected = authenticator.require_scopes(
        Router::new().route("/v1/whoami", get(whoami)),
        RequiredScopes::new([PROFILE])?,
    );

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
        .merge(protected)
        .layer(ServiceBuilder::new().layer(trace)))
}

/// Drops expired token cache entries every `period` until `shutdown` fires
fn start_cache_sweeper(
    authorizer: Arc<Authorizer>,
    period: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = authorizer.purge_expired_tokens();
                    if purged > 0 {
                        debug!(purged, "purged expired token cache entries");
                    }
                }
            }
        }
    })
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting authorization server v{}", accounts_authz::VERSION);

    let config = AuthzConfig::from_env().context("loading configuration")?;
    info!(
        listen_addr = %config.listen_addr,
        idp_url = %config.idp_url,
        token_cache_size = config.token_cache.capacity,
        token_cache_ttl_secs = config.token_cache.ttl.as_secs(),
        "configuration loaded"
    );

    let remote = HttpTokenIntrospector::new(
        &config.idp_url,
        config.client_id.clone(),
        config.client_secret.clone(),
        config.introspection_timeout,
    )
    .context("building introspection client")?;
    let introspector = CachedIntrospector::new(Arc::new(remote), &config.token_cache);

    let authorizer = Arc::new(Authorizer::new(introspector, Arc::new(TracingSink)));

    let sweeper_shutdown = CancellationToken::new();
    let sweeper = config.token_cache.is_enabled().then(|| {
        start_cache_sweeper(
            authorizer.clone(),
            config.token_cache.ttl,
            sweeper_shutdown.clone(),
        )
    });

    let state = AppState {
        authorizer,
        start_time: Instant::now(),
    };
    let app = create_router(state)?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("Starting HTTP server on {}", config.listen_addr);

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    sweeper_shutdown.cancel();
    if let Some(sweeper) = sweeper {
        sweeper.await.context("cache sweeper task")?;
    }

    info!("Server shut down gracefully");
    Ok(())
}
