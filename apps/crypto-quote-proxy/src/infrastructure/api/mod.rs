//! Query and Health HTTP API
//!
//! HTTP surface for synchronous point-in-time lookups against the
//! provider, plus health checks and Prometheus metrics. The streaming
//! core does not depend on this layer; it only reads the core's
//! observable state.
//!
//! # Endpoints
//!
//! - `GET /` - Service banner
//! - `GET /api/quote/{symbol}/{currency}` - Single-pair price
//! - `GET /api/quotes?symbols=..&currencies=..` - Multi-pair price map
//! - `GET /api/quotes/history/daily/{symbol}/{currency}?length=N` - Daily history
//! - `GET /api/trading/signal/{symbol}` - Latest trading signals
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (checks the upstream session)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::quote::QuoteEvent;
use crate::domain::subscription::SubscriptionSet;
use crate::infrastructure::bus::SharedEventBus;
use crate::infrastructure::cryptocompare::rest::{
    LookupError, PriceMap, RestClient, SymbolHistory, SymbolSignals,
};
use crate::infrastructure::cryptocompare::stream::{ConnectionState, StreamClient};
use crate::infrastructure::fanout::ClientRegistry;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Proxy version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream session status.
    pub upstream: UpstreamStatus,
    /// Connected downstream clients.
    pub clients: ClientStatus,
    /// Event bus receiver statistics.
    pub bus: BusStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Streaming and subscribed.
    Healthy,
    /// Connecting or recovering; quote gaps are possible.
    Degraded,
    /// No upstream session.
    Unhealthy,
}

/// Upstream session status.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamStatus {
    /// Connection lifecycle state.
    pub state: String,
    /// Whether frames are currently being dispatched.
    pub streaming: bool,
    /// The session identifier assigned by the upstream, if welcomed.
    pub session_id: Option<String>,
    /// Frames received since startup.
    pub messages_received: u64,
    /// Reconnection attempts since startup.
    pub reconnects: u32,
    /// Number of subscribed pairs.
    pub subscribed_pairs: usize,
}

/// Connected downstream client information.
#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    /// Total connected delivery channels.
    pub total: usize,
}

/// Event bus receiver statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BusStatus {
    /// Total receivers across all channels.
    pub receivers: usize,
}

// =============================================================================
// API Server State
// =============================================================================

/// Shared state for the API server.
pub struct ApiState {
    version: String,
    started_at: Instant,
    rest: Arc<RestClient>,
    stream: Arc<StreamClient>,
    registry: Arc<ClientRegistry>,
    bus: SharedEventBus,
    defaults: SubscriptionSet,
}

impl ApiState {
    /// Create new API server state.
    #[must_use]
    pub fn new(
        version: String,
        rest: Arc<RestClient>,
        stream: Arc<StreamClient>,
        registry: Arc<ClientRegistry>,
        bus: SharedEventBus,
        defaults: SubscriptionSet,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            rest,
            stream,
            registry,
            bus,
            defaults,
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// Query and health HTTP server.
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ApiState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// Build the API router. Exposed for integration tests.
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(banner_handler))
        .route("/api/quote/{symbol}/{currency}", get(quote_handler))
        .route("/api/quotes", get(quotes_handler))
        .route(
            "/api/quotes/history/daily/{symbol}/{currency}",
            get(history_handler),
        )
        .route("/api/trading/signal/{symbol}", get(signal_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct QuotesParams {
    symbols: Option<String>,
    currencies: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    length: Option<u32>,
}

async fn banner_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    format!("crypto-quote-proxy {} is running", state.version)
}

async fn quote_handler(
    State(state): State<Arc<ApiState>>,
    Path((symbol, currency)): Path<(String, String)>,
) -> Result<Json<QuoteEvent>, ApiError> {
    let quote = state.rest.price_pair(&symbol, &currency).await?;
    Ok(Json(quote))
}

async fn quotes_handler(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<QuotesParams>,
) -> Result<Json<PriceMap>, ApiError> {
    // An absent or empty parameter falls back to the configured defaults.
    let symbols = params
        .symbols
        .filter(|raw| !raw.is_empty())
        .map_or_else(|| state.defaults.symbols().to_vec(), |raw| split_list(&raw));
    let currencies = params
        .currencies
        .filter(|raw| !raw.is_empty())
        .map_or_else(
            || state.defaults.currencies().to_vec(),
            |raw| split_list(&raw),
        );

    let prices = state.rest.price_multi(&symbols, &currencies).await?;
    Ok(Json(prices))
}

async fn history_handler(
    State(state): State<Arc<ApiState>>,
    Path((symbol, currency)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<SymbolHistory>, ApiError> {
    let history = state
        .rest
        .daily_history(&symbol, &currency, params.length)
        .await?;
    Ok(Json(history))
}

async fn signal_handler(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
) -> Result<Json<SymbolSignals>, ApiError> {
    let signals = state.rest.trading_signal(&symbol).await?;
    Ok(Json(signals))
}

async fn health_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if state.stream.state() == ConnectionState::Streaming {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &ApiState) -> HealthResponse {
    let connection_state = state.stream.state();

    HealthResponse {
        status: health_status_for(connection_state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        upstream: UpstreamStatus {
            state: connection_state.as_str().to_string(),
            streaming: connection_state == ConnectionState::Streaming,
            session_id: state.stream.session_id(),
            messages_received: state.stream.messages_received(),
            reconnects: state.stream.reconnect_count(),
            subscribed_pairs: state.stream.subscriptions().pair_count(),
        },
        clients: ClientStatus {
            total: state.registry.connection_count(),
        },
        bus: BusStatus {
            receivers: state.bus.stats().total_receivers(),
        },
    }
}

const fn health_status_for(state: ConnectionState) -> HealthStatus {
    match state {
        ConnectionState::Streaming => HealthStatus::Healthy,
        ConnectionState::Connecting
        | ConnectionState::AwaitingWelcome
        | ConnectionState::Reconnecting => HealthStatus::Degraded,
        ConnectionState::Disconnected | ConnectionState::Closed => HealthStatus::Unhealthy,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

// =============================================================================
// Errors
// =============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

/// Error body returned to API callers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LookupError> for ApiError {
    fn from(error: LookupError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================
