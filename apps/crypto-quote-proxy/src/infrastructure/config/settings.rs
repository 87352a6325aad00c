//! Proxy Configuration Settings
//!
//! Configuration types for the quote proxy, loaded from environment
//! variables. The `BCB_*` names are the service's historical surface and
//! are kept stable for deployment compatibility.

use std::time::Duration;

/// Default CryptoCompare REST API base URL.
pub const DEFAULT_REST_BASE_URL: &str = "https://min-api.cryptocompare.com/data";

/// Default CryptoCompare streamer websocket URL.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://streamer.cryptocompare.com/v2";

/// CryptoCompare API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String) -> Self {
        Self { api_key }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Query/health HTTP API port.
    pub api_port: u16,
    /// Downstream websocket gateway port.
    pub gateway_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 3000,
            gateway_port: 3001,
        }
    }
}

/// Upstream stream connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Fixed delay before each reconnection attempt. Drops are treated as
    /// transient, so there is no backoff and no attempt cap.
    pub reconnect_delay: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Event bus channel capacities.
#[derive(Debug, Clone)]
pub struct BusSettings {
    /// Capacity of the quote channel.
    pub quotes_capacity: usize,
    /// Capacity of the quote-update channel.
    pub quote_updates_capacity: usize,
    /// Capacity of the heartbeat channel.
    pub heartbeats_capacity: usize,
    /// Capacity of the client lifecycle channels.
    pub lifecycle_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            quotes_capacity: 1_024,
            quote_updates_capacity: 256,
            heartbeats_capacity: 64,
            lifecycle_capacity: 64,
        }
    }
}

/// Downstream fan-out settings.
#[derive(Debug, Clone)]
pub struct FanoutSettings {
    /// Per-client delivery queue depth.
    pub client_buffer: usize,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self { client_buffer: 64 }
    }
}

/// Complete proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// REST API base URL.
    pub rest_base_url: String,
    /// Streamer websocket URL.
    pub websocket_url: String,
    /// Default symbols to subscribe to.
    pub symbols: Vec<String>,
    /// Default currencies to subscribe to.
    pub currencies: Vec<String>,
    /// Server port settings.
    pub server: ServerSettings,
    /// Upstream stream settings.
    pub stream: StreamSettings,
    /// Event bus settings.
    pub bus: BusSettings,
    /// Downstream fan-out settings.
    pub fanout: FanoutSettings,
}

impl ProxyConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `BCB_API_KEY` is missing or empty, or if a
    /// symbol/currency list is set but contains no entries.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("BCB_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("BCB_API_KEY".to_string()))?;

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("BCB_API_KEY".to_string()));
        }

        let rest_base_url = std::env::var("BCB_BASE_REST_URL")
            .unwrap_or_else(|_| DEFAULT_REST_BASE_URL.to_string());

        let websocket_url = std::env::var("BCB_WEBSOCKET_URL")
            .unwrap_or_else(|_| DEFAULT_WEBSOCKET_URL.to_string());

        let symbols = parse_list(std::env::var("BCB_DEFAULT_PAIRS").ok(), "BTC");
        if symbols.is_empty() {
            return Err(ConfigError::EmptyValue("BCB_DEFAULT_PAIRS".to_string()));
        }

        let currencies = parse_list(std::env::var("BCB_DEFAULT_CURRENCIES").ok(), "USD");
        if currencies.is_empty() {
            return Err(ConfigError::EmptyValue(
                "BCB_DEFAULT_CURRENCIES".to_string(),
            ));
        }

        let server = ServerSettings {
            api_port: parse_env_u16("BCB_API_PORT", ServerSettings::default().api_port),
            gateway_port: parse_env_u16(
                "BCB_WEBSOCKET_PORT",
                ServerSettings::default().gateway_port,
            ),
        };

        let stream = StreamSettings {
            reconnect_delay: parse_env_duration_millis(
                "BCB_RECONNECT_DELAY_MS",
                StreamSettings::default().reconnect_delay,
            ),
        };

        let bus = BusSettings {
            quotes_capacity: parse_env_usize(
                "BCB_QUOTES_CAPACITY",
                BusSettings::default().quotes_capacity,
            ),
            quote_updates_capacity: parse_env_usize(
                "BCB_QUOTE_UPDATES_CAPACITY",
                BusSettings::default().quote_updates_capacity,
            ),
            heartbeats_capacity: parse_env_usize(
                "BCB_HEARTBEATS_CAPACITY",
                BusSettings::default().heartbeats_capacity,
            ),
            lifecycle_capacity: parse_env_usize(
                "BCB_LIFECYCLE_CAPACITY",
                BusSettings::default().lifecycle_capacity,
            ),
        };

        let fanout = FanoutSettings {
            client_buffer: parse_env_usize(
                "BCB_CLIENT_BUFFER",
                FanoutSettings::default().client_buffer,
            ),
        };

        Ok(Self {
            credentials: Credentials::new(api_key),
            rest_base_url,
            websocket_url,
            symbols,
            currencies,
            server,
            stream,
            bus,
            fanout,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

/// Split a comma-separated list, trimming entries and dropping blanks.
/// Falls back to `default` when the variable is unset.
fn parse_list(raw: Option<String>, default: &str) -> Vec<String> {
    raw.unwrap_or_else(|| default.to_string())
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parse_list_defaults_when_unset() {
        assert_eq!(parse_list(None, "BTC"), vec!["BTC"]);
    }

    #[test]
    fn parse_list_splits_and_trims() {
        let parsed = parse_list(Some("BTC, ETH ,XRP".to_string()), "BTC");
        assert_eq!(parsed, vec!["BTC", "ETH", "XRP"]);
    }

    #[test]
    fn parse_list_drops_blank_entries() {
        let parsed = parse_list(Some("BTC,,ETH,".to_string()), "BTC");
        assert_eq!(parsed, vec!["BTC", "ETH"]);
    }

    #[test]
    fn parse_list_empty_value_yields_empty_list() {
        assert!(parse_list(Some(String::new()), "BTC").is_empty());
    }

    #[test]
    fn server_settings_defaults() {
        let settings = ServerSettings::default();
        assert_eq!(settings.api_port, 3000);
        assert_eq!(settings.gateway_port, 3001);
    }

    #[test]
    fn stream_settings_defaults() {
        let settings = StreamSettings::default();
        assert_eq!(settings.reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn bus_settings_defaults() {
        let settings = BusSettings::default();
        assert_eq!(settings.quotes_capacity, 1_024);
        assert_eq!(settings.quote_updates_capacity, 256);
    }
}
