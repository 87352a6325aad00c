//! Crypto Quote Proxy Binary
//!
//! Starts the quote stream proxy.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin crypto-quote-proxy
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `BCB_API_KEY`: CryptoCompare API key
//!
//! ## Optional
//! - `BCB_BASE_REST_URL`: REST API base URL (default: <https://min-api.cryptocompare.com/data>)
//! - `BCB_WEBSOCKET_URL`: Streamer websocket URL (default: <wss://streamer.cryptocompare.com/v2>)
//! - `BCB_DEFAULT_PAIRS`: Comma-separated symbols (default: BTC)
//! - `BCB_DEFAULT_CURRENCIES`: Comma-separated currencies (default: USD)
//! - `BCB_API_PORT`: Query/health HTTP port (default: 3000)
//! - `BCB_WEBSOCKET_PORT`: Downstream gateway port (default: 3001)
//! - `BCB_RECONNECT_DELAY_MS`: Delay before upstream reconnects (default: 1000)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: crypto-quote-proxy)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Result;
use crypto_quote_proxy::infrastructure::telemetry;
use crypto_quote_proxy::{
    ApiServer, ApiState, BusConfig, ClientRegistry, EventBus, GatewayServer, ProxyConfig,
    RestClient, StreamClient, StreamClientConfig, SubscriptionSet, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Crypto Quote Proxy");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ProxyConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Initialize the event bus
    let bus = Arc::new(EventBus::new(BusConfig::from(config.bus.clone())));

    // Initialize the downstream fan-out registry
    let registry = Arc::new(ClientRegistry::new(
        Arc::clone(&bus),
        config.fanout.client_buffer,
    ));

    // Initialize the REST client (queries + stream fallback)
    let rest = Arc::new(RestClient::new(
        config.rest_base_url.clone(),
        config.credentials.clone(),
    )?);

    // Build the active subscription set from the configured defaults
    let subscriptions = SubscriptionSet::new(config.symbols.clone(), config.currencies.clone())?;

    // Initialize the upstream stream client
    let stream_config = StreamClientConfig {
        url: config.websocket_url.clone(),
        credentials: config.credentials.clone(),
        subscriptions: subscriptions.clone(),
        reconnect_delay: config.stream.reconnect_delay,
    };
    let stream_client = Arc::new(StreamClient::new(
        stream_config,
        Arc::clone(&bus),
        Arc::clone(&rest),
        shutdown_token.clone(),
    ));

    // Spawn the fan-out loop
    let fanout_registry = Arc::clone(&registry);
    let fanout_cancel = shutdown_token.clone();
    tokio::spawn(async move {
        fanout_registry.run(fanout_cancel).await;
    });

    // Spawn the downstream gateway
    let gateway = GatewayServer::new(
        config.server.gateway_port,
        Arc::clone(&registry),
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = gateway.run().await {
            tracing::error!(error = %e, "Gateway server error");
        }
    });

    // Spawn the query/health API server
    let api_state = Arc::new(ApiState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&rest),
        Arc::clone(&stream_client),
        Arc::clone(&registry),
        Arc::clone(&bus),
        subscriptions,
    ));
    let api_server = ApiServer::new(config.server.api_port, api_state, shutdown_token.clone());
    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // Spawn the upstream stream client
    let stream_task = Arc::clone(&stream_client);
    tokio::spawn(async move {
        if let Err(e) = stream_task.run().await {
            tracing::error!(error = %e, "Stream client error");
        }
    });

    tracing::info!("Quote proxy ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Quote proxy stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ProxyConfig) {
    tracing::info!(
        api_port = config.server.api_port,
        gateway_port = config.server.gateway_port,
        symbols = ?config.symbols,
        currencies = ?config.currencies,
        "Configuration loaded"
    );
    tracing::debug!(
        websocket_url = %config.websocket_url,
        rest_base_url = %config.rest_base_url,
        reconnect_delay_ms = config.stream.reconnect_delay.as_millis() as u64,
        "Upstream endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
