//! Client configuration
//!
//! [`ClientConfig`] carries the endpoints and timing knobs for a live session.
//! Defaults target a local development backend; [`ClientConfig::load`] reads
//! overrides from `CHAPTER_LIVE__*` environment variables (a `.env` file is
//! honored during development).
//!
//! # Environment Variable Format
//!
//! - `CHAPTER_LIVE__WS_URL=wss://example.org/ws`
//! - `CHAPTER_LIVE__API_BASE_URL=https://example.org`
//! - `CHAPTER_LIVE__MAX_RECONNECT_ATTEMPTS=5`

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::monitor::MonitorConfig;
use crate::websocket::ReconnectConfig;

/// Configuration for a live session and its REST bindings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint for live notifications
    pub ws_url: String,
    /// Base URL of the backend; REST paths are resolved under `{api_base_url}/api`
    pub api_base_url: String,
    /// Timeout applied to every REST request, in seconds
    pub request_timeout_secs: u64,
    /// Interval between keep-alive pings, in seconds
    pub keep_alive_interval_secs: u64,
    /// Reconnect attempts after an unclean close before giving up
    pub max_reconnect_attempts: u32,
    /// Upper bound on the delay between reconnect attempts, in seconds
    pub max_reconnect_delay_secs: u64,
    /// Interval between monitoring refreshes, in seconds
    pub monitor_refresh_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: Self::DEFAULT_WS_URL.to_string(),
            api_base_url: Self::DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            keep_alive_interval_secs: 30,
            max_reconnect_attempts: 5,
            max_reconnect_delay_secs: 30,
            monitor_refresh_interval_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Default WebSocket endpoint (local backend)
    pub const DEFAULT_WS_URL: &'static str = "ws://localhost:8080/ws";

    /// Default REST base URL (local backend)
    pub const DEFAULT_API_BASE_URL: &'static str = "http://localhost:8080";

    /// Load configuration from the environment, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the result
    /// fails [`validate`](Self::validate).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("CHAPTER_LIVE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Override the WebSocket endpoint
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    /// Override the REST base URL
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Check URL schemes and that every interval is non-zero
    pub fn validate(&self) -> Result<()> {
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "ws_url must use ws:// or wss://, got {}",
                self.ws_url
            )));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "api_base_url must use http:// or https://, got {}",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if self.keep_alive_interval_secs == 0 {
            return Err(Error::Config(
                "keep_alive_interval_secs must be positive".into(),
            ));
        }
        if self.max_reconnect_delay_secs == 0 {
            return Err(Error::Config(
                "max_reconnect_delay_secs must be positive".into(),
            ));
        }
        if self.monitor_refresh_interval_secs == 0 {
            return Err(Error::Config(
                "monitor_refresh_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }

    /// Monitoring refresh settings derived from this configuration
    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            refresh_interval: Duration::from_secs(self.monitor_refresh_interval_secs),
            ..MonitorConfig::default()
        }
    }

    /// Reconnect policy derived from this configuration
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            max_delay: Duration::from_secs(self.max_reconnect_delay_secs),
            max_attempts: self.max_reconnect_attempts,
            ..ReconnectConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ws_url, "ws://localhost:8080/ws");
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(30));
        assert_eq!(config.reconnect().max_attempts, 5);
        assert_eq!(config.monitor().refresh_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_scheme() {
        let config = ClientConfig::default().with_ws_url("http://localhost:8080/ws");
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ClientConfig::default().with_api_base_url("localhost:8080");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_intervals() {
        let config = ClientConfig {
            keep_alive_interval_secs: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            monitor_refresh_interval_secs: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("CHAPTER_LIVE__WS_URL", "wss://chapters.example.org/ws");
        env::set_var("CHAPTER_LIVE__MAX_RECONNECT_ATTEMPTS", "3");
        let result = ClientConfig::load();
        env::remove_var("CHAPTER_LIVE__WS_URL");
        env::remove_var("CHAPTER_LIVE__MAX_RECONNECT_ATTEMPTS");

        let config = result.unwrap();
        assert_eq!(config.ws_url, "wss://chapters.example.org/ws");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.api_base_url, ClientConfig::DEFAULT_API_BASE_URL);
    }
}
