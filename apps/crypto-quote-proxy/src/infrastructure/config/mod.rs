//! Configuration Module
//!
//! Configuration loading for the proxy service.

mod settings;

pub use settings::{
    BusSettings, ConfigError, Credentials, FanoutSettings, ProxyConfig, ServerSettings,
    StreamSettings,
};
