//! CryptoCompare Adapters
//!
//! Implements the clients for CryptoCompare's two surfaces:
//!
//! - **Stream**: websocket client for aggregate quote frames (JSON codec)
//! - **REST**: point-in-time price, history, and trading-signal queries,
//!   also serving as the fallback path when the stream rejects a
//!   subscription

pub mod codec;
pub mod messages;
pub mod rest;
pub mod stream;

pub use codec::{CodecError, StreamCodec, pair_token, parse_pair_token};
pub use messages::{
    AGGREGATE_MARKET, AggregateQuoteMessage, InvalidSubscriptionMessage, KIND_AGGREGATE_QUOTE,
    KIND_HEARTBEAT, KIND_INVALID_SUBSCRIPTION, KIND_WELCOME, StreamMessage, SubscriptionRequest,
    WelcomeMessage,
};
pub use rest::{
    HistoryPoint, LookupError, PriceMap, RestClient, SymbolHistory, SymbolSignals, TradingSignal,
};
pub use stream::{ConnectionState, StreamClient, StreamClientConfig, StreamClientError};
