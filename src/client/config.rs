use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use std::time::Duration;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

/// Default bound for a single remote call
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for establishing the push connection
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default base interval for retry backoff
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default cap for retry backoff
const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(300);

/// Default maximum replay attempts before a pending operation is
/// surfaced as permanently failed
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Client configuration wrapper.
///
/// Resolves the backend base URL (overridable via `SHELFSYNC_API_URL`),
/// derives the websocket URL from it, and carries the engine tunables. Every
/// remote call and channel connect is bounded by one of these timeouts; no
/// call may block its caller indefinitely.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    request_timeout: Duration,
    connect_timeout: Duration,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        let server_url =
            std::env::var("SHELFSYNC_API_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let app = AppConfig::builder()
            .server_url(server_url)
            .build()
            .expect("default app config is valid");
        Self {
            app,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration pointing at an explicit server URL
    pub fn with_server_url(url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_builder(AppConfig::builder().server_url(url.into()))
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        let app = builder.build()?;
        Ok(Self {
            app,
            ..Self::default()
        })
    }

    /// Override the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the channel connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the retry backoff window
    pub fn backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Override the maximum replay attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    /// Get the websocket URL for the push channel.
    ///
    /// Derived from the server URL: `http` becomes `ws`, `https` becomes `wss`.
    pub fn ws_url(&self) -> String {
        let url = self.server_url();
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", url)
        }
    }

    pub fn get_request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn get_connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn get_backoff_base(&self) -> Duration {
        self.backoff_base
    }

    pub fn get_backoff_cap(&self) -> Duration {
        self.backoff_cap
    }

    pub fn get_max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
