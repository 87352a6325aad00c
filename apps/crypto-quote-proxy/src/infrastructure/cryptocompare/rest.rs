//! CryptoCompare REST Client
//!
//! Synchronous point-in-time queries against the provider's REST API.
//! Serves two callers: the connection manager's fallback path when the
//! stream rejects a subscription, and the HTTP query layer's price,
//! history, and trading-signal endpoints.
//!
//! Every endpoint reports failures as [`LookupError`]; the fallback
//! caller treats that as non-fatal and simply forgoes publishing the
//! pair's correction.

use std::collections::HashMap;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::quote::QuoteEvent;
use crate::infrastructure::config::Credentials;
use crate::infrastructure::cryptocompare::messages::AGGREGATE_MARKET;

/// Default number of days returned by the daily history endpoint.
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Upstream status field value marking a successful envelope.
const RESPONSE_SUCCESS: &str = "Success";

/// Nested symbol -> currency -> price mapping returned by `pricemulti`.
pub type PriceMap = HashMap<String, HashMap<String, f64>>;

// =============================================================================
// Error Type
// =============================================================================

/// Point-in-time lookup errors.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Network-level or protocol-level HTTP failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream returned a non-success HTTP status.
    #[error("upstream returned status {0}")]
    Status(StatusCode),

    /// The upstream answered with an error envelope.
    #[error("upstream rejected request: {0}")]
    Rejected(String),

    /// The payload did not have the expected shape.
    #[error("malformed response payload: {0}")]
    Malformed(String),

    /// The requested pair is absent from an otherwise valid payload.
    #[error("no price for pair {symbol}/{currency} in response")]
    MissingPair {
        /// The crypto symbol that was requested.
        symbol: String,
        /// The currency that was requested.
        currency: String,
    },
}

// =============================================================================
// Response Shapes
// =============================================================================

/// Daily close history for one pair, reduced for downstream clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolHistory {
    /// The crypto symbol.
    pub symbol: String,
    /// The fiat currency symbol.
    pub currency: String,
    /// The number of days requested.
    pub length: u32,
    /// Daily closing values, oldest first.
    pub data: Vec<HistoryPoint>,
}

/// One daily history data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Epoch unix timestamp of the day.
    pub time: i64,
    /// Closing value for the day.
    pub value: f64,
}

/// Latest IntoTheBlock trading signals for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSignals {
    /// The crypto symbol.
    pub symbol: String,
    /// Epoch unix timestamp the signals were computed at.
    pub time: i64,
    /// The signals present in the upstream response.
    pub signals: Vec<TradingSignal>,
}

/// One trading signal reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    /// Signal name, e.g. `inOutVar`.
    pub name: String,
    /// Latest sentiment: bullish, bearish or neutral.
    pub sentiment: String,
    /// Normalized score between 0 and 1.
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct HistoDayResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Data", default)]
    data: Vec<HistoDayPoint>,
}

#[derive(Debug, Deserialize)]
struct HistoDayPoint {
    #[serde(default)]
    time: i64,
    #[serde(default)]
    close: f64,
}

#[derive(Debug, Deserialize)]
struct SignalsResponse {
    #[serde(rename = "Response", default)]
    response: String,
    #[serde(rename = "Data")]
    data: Option<SignalsData>,
}

#[derive(Debug, Deserialize)]
struct SignalsData {
    #[serde(default)]
    time: i64,
    #[serde(rename = "inOutVar")]
    in_out_var: Option<SignalReading>,
    #[serde(rename = "largetxsVar")]
    large_txs_var: Option<SignalReading>,
    #[serde(rename = "addressesNetGrowth")]
    addresses_net_growth: Option<SignalReading>,
    #[serde(rename = "concentrationVar")]
    concentration_var: Option<SignalReading>,
}

#[derive(Debug, Deserialize)]
struct SignalReading {
    #[serde(default)]
    sentiment: String,
    #[serde(default)]
    score: f64,
}

// =============================================================================
// REST Client
// =============================================================================

/// CryptoCompare REST API client.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl RestClient {
    /// Create a new REST client for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: String, credentials: Credentials) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Get the price for a single (symbol, currency) pair.
    ///
    /// The returned quote carries the raw provider price; callers on the
    /// streaming path apply rounding and the fallback note themselves.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on network failure, a non-success status,
    /// an upstream error envelope, or a payload missing the pair.
    pub async fn price_pair(&self, symbol: &str, currency: &str) -> Result<QuoteEvent, LookupError> {
        let prices = self
            .price_multi(&[symbol.to_string()], &[currency.to_string()])
            .await?;
        quote_from_price_map(&prices, symbol, currency)
    }

    /// Get prices for the cross product of multiple symbols and currencies.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on network failure, a non-success status,
    /// an upstream error envelope, or a malformed payload.
    pub async fn price_multi(
        &self,
        symbols: &[String],
        currencies: &[String],
    ) -> Result<PriceMap, LookupError> {
        let url = format!(
            "{}/pricemulti?e={AGGREGATE_MARKET}&fsyms={}&tsyms={}",
            self.base_url,
            symbols.join(","),
            currencies.join(",")
        );

        let payload: Value = self.get_json(&url).await?;

        if let Some(message) = error_envelope(&payload) {
            return Err(LookupError::Rejected(message));
        }

        serde_json::from_value(payload).map_err(|e| LookupError::Malformed(e.to_string()))
    }

    /// Get daily close history for a pair. `length` defaults to
    /// [`DEFAULT_HISTORY_DAYS`].
    ///
    /// A non-success upstream envelope yields an empty data set rather
    /// than an error, matching the query surface's lenient contract.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on network failure or a non-success status.
    pub async fn daily_history(
        &self,
        symbol: &str,
        currency: &str,
        length: Option<u32>,
    ) -> Result<SymbolHistory, LookupError> {
        let length = length.unwrap_or(DEFAULT_HISTORY_DAYS);
        let url = format!(
            "{}/histoday?e={AGGREGATE_MARKET}&fsym={symbol}&tsym={currency}&limit={length}",
            self.base_url
        );

        let payload: HistoDayResponse = self.get_json(&url).await?;

        let data = if payload.response == RESPONSE_SUCCESS {
            payload
                .data
                .into_iter()
                .map(|point| HistoryPoint {
                    time: point.time,
                    value: point.close,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(SymbolHistory {
            symbol: symbol.to_string(),
            currency: currency.to_string(),
            length,
            data,
        })
    }

    /// Get the latest IntoTheBlock trading signals for a symbol.
    ///
    /// Only the signal variants present in the response are returned; a
    /// non-success envelope yields an empty signal list.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] on network failure or a non-success status.
    pub async fn trading_signal(&self, symbol: &str) -> Result<SymbolSignals, LookupError> {
        let url = format!(
            "{}/tradingsignals/intotheblock/latest?fsym={symbol}",
            self.base_url
        );

        let payload: SignalsResponse = self.get_json(&url).await?;
        Ok(signals_from_response(symbol, payload))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, LookupError> {
        let response = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .header(
                AUTHORIZATION,
                format!("ApiKey {}", self.credentials.api_key()),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }

        Ok(response.json().await?)
    }
}

// =============================================================================
// Payload Reduction
// =============================================================================

/// Detect the upstream `{"Response": "Error", "Message": ...}` envelope.
fn error_envelope(payload: &Value) -> Option<String> {
    let response = payload.get("Response").and_then(Value::as_str)?;
    if response == RESPONSE_SUCCESS {
        return None;
    }

    let message = payload
        .get("Message")
        .and_then(Value::as_str)
        .unwrap_or("unknown upstream error");
    Some(message.to_string())
}

fn quote_from_price_map(
    prices: &PriceMap,
    symbol: &str,
    currency: &str,
) -> Result<QuoteEvent, LookupError> {
    prices
        .get(symbol)
        .and_then(|amounts| amounts.get(currency))
        .map(|price| QuoteEvent::new(symbol, currency, *price))
        .ok_or_else(|| LookupError::MissingPair {
            symbol: symbol.to_string(),
            currency: currency.to_string(),
        })
}

fn signals_from_response(symbol: &str, payload: SignalsResponse) -> SymbolSignals {
    let mut signals = Vec::new();
    let mut time = 0;

    if payload.response == RESPONSE_SUCCESS
        && let Some(data) = payload.data
    {
        time = data.time;

        let readings = [
            ("inOutVar", data.in_out_var),
            ("largetxsVar", data.large_txs_var),
            ("addressesNetGrowth", data.addresses_net_growth),
            ("concentrationVar", data.concentration_var),
        ];

        for (name, reading) in readings {
            if let Some(reading) = reading {
                signals.push(TradingSignal {
                    name: name.to_string(),
                    sentiment: reading.sentiment,
                    score: reading.score,
                });
            }
        }
    }

    SymbolSignals {
        symbol: symbol.to_string(),
        time,
        signals,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_from_price_map_finds_pair() {
        let payload = r#"{"LTC":{"ZAR":250.75}}"#;
        let prices: PriceMap = serde_json::from_str(payload).unwrap();

        let quote = quote_from_price_map(&prices, "LTC", "ZAR").unwrap();
        assert_eq!(quote.symbol, "LTC");
        assert_eq!(quote.currency, "ZAR");
        assert_eq!(quote.price, 250.75);
        assert!(quote.note.is_none());
    }

    #[test]
    fn quote_from_price_map_reports_missing_pair() {
        let payload = r#"{"LTC":{"USD":75.0}}"#;
        let prices: PriceMap = serde_json::from_str(payload).unwrap();

        let err = quote_from_price_map(&prices, "LTC", "ZAR").unwrap_err();
        assert!(matches!(
            err,
            LookupError::MissingPair { symbol, currency } if symbol == "LTC" && currency == "ZAR"
        ));
    }

    #[test]
    fn error_envelope_detected() {
        let payload: Value =
            serde_json::from_str(r#"{"Response":"Error","Message":"invalid fsyms"}"#).unwrap();
        assert_eq!(error_envelope(&payload), Some("invalid fsyms".to_string()));
    }

    #[test]
    fn price_map_payload_is_not_an_envelope() {
        let payload: Value = serde_json::from_str(r#"{"BTC":{"USD":10000.0}}"#).unwrap();
        assert_eq!(error_envelope(&payload), None);
    }

    #[test]
    fn history_reduces_to_time_and_close() {
        let payload: HistoDayResponse = serde_json::from_str(
            r#"{"Response":"Success","Data":[
                {"time":1600000000,"high":110.0,"low":90.0,"open":95.0,"close":100.5},
                {"time":1600086400,"high":120.0,"low":100.0,"open":100.5,"close":115.0}
            ]}"#,
        )
        .unwrap();

        assert_eq!(payload.response, "Success");
        assert_eq!(payload.data.len(), 2);
        assert_eq!(payload.data[0].time, 1_600_000_000);
        assert_eq!(payload.data[1].close, 115.0);
    }

    #[test]
    fn signals_collect_present_readings_in_fixed_order() {
        let payload: SignalsResponse = serde_json::from_str(
            r#"{"Response":"Success","Data":{
                "time":1600000000,
                "inOutVar":{"sentiment":"bullish","score":0.7},
                "concentrationVar":{"sentiment":"bearish","score":0.3}
            }}"#,
        )
        .unwrap();

        let signals = signals_from_response("BTC", payload);
        assert_eq!(signals.symbol, "BTC");
        assert_eq!(signals.time, 1_600_000_000);

        let names: Vec<&str> = signals.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["inOutVar", "concentrationVar"]);
        assert_eq!(signals.signals[0].sentiment, "bullish");
        assert_eq!(signals.signals[1].score, 0.3);
    }

    #[test]
    fn signals_empty_on_error_envelope() {
        let payload: SignalsResponse =
            serde_json::from_str(r#"{"Response":"Error","Message":"no data"}"#).unwrap();

        let signals = signals_from_response("BTC", payload);
        assert!(signals.signals.is_empty());
        assert_eq!(signals.time, 0);
    }
}
