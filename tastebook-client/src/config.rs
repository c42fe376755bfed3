//! Client configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | TASTEBOOK_API_URL | http://localhost:54321 | backend base URL |
//! | TASTEBOOK_ANON_KEY | (empty) | project API key |
//! | TASTEBOOK_GEOCODER_URL | https://nominatim.openstreetmap.org | geocoding service |
//! | TASTEBOOK_MAX_RETRIES | 3 | retries after the first attempt |
//! | TASTEBOOK_BASE_DELAY_MS | 1000 | backoff base |
//! | TASTEBOOK_TIMEOUT_MS | 10000 | per-attempt timeout |
//! | TASTEBOOK_SESSION_REFRESH_SECS | 300 | session token refresh interval |
//! | TASTEBOOK_LOG_LEVEL | info | default log level |

use std::time::Duration;

use crate::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS, RetryPolicy};

pub const DEFAULT_API_URL: &str = "http://localhost:54321";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_SESSION_REFRESH_SECS: u64 = 300;

/// Client configuration for connecting to the hosted backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (e.g., "https://xyz.example.co")
    pub api_url: String,

    /// Project API key, sent as the `apikey` header
    pub anon_key: String,

    /// Geocoding service base URL
    pub geocoder_url: String,

    /// User-Agent for outbound requests (required by public geocoders)
    pub user_agent: String,

    /// Retry policy applied to every remote call
    pub retry: RetryPolicy,

    /// How often the session token is refreshed
    pub session_refresh_interval: Duration,

    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the URL
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            anon_key: String::new(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: format!("tastebook/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
            session_refresh_interval: Duration::from_secs(DEFAULT_SESSION_REFRESH_SECS),
            log_level: "info".to_string(),
        }
    }

    /// Load from the process environment (and a `.env` file, if present)
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup; unset or unparsable values fall
    /// back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let mut config =
            Self::new(lookup("TASTEBOOK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()));

        if let Some(key) = lookup("TASTEBOOK_ANON_KEY") {
            config.anon_key = key;
        }
        if let Some(url) = lookup("TASTEBOOK_GEOCODER_URL") {
            config.geocoder_url = url;
        }
        if let Some(level) = lookup("TASTEBOOK_LOG_LEVEL") {
            config.log_level = level;
        }

        let max_retries = parsed("TASTEBOOK_MAX_RETRIES", u64::from(DEFAULT_MAX_RETRIES));
        config.retry = RetryPolicy::default()
            .with_max_retries(u32::try_from(max_retries).unwrap_or(DEFAULT_MAX_RETRIES))
            .with_base_delay(Duration::from_millis(parsed(
                "TASTEBOOK_BASE_DELAY_MS",
                DEFAULT_BASE_DELAY_MS,
            )))
            .with_timeout(Duration::from_millis(parsed(
                "TASTEBOOK_TIMEOUT_MS",
                DEFAULT_TIMEOUT_MS,
            )));
        config.session_refresh_interval = Duration::from_secs(parsed(
            "TASTEBOOK_SESSION_REFRESH_SECS",
            DEFAULT_SESSION_REFRESH_SECS,
        ));

        config
    }

    /// Set the project API key
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = key.into();
        self
    }

    /// Set the geocoder base URL
    pub fn with_geocoder_url(mut self, url: impl Into<String>) -> Self {
        self.geocoder_url = url.into();
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the session refresh interval
    pub fn with_session_refresh_interval(mut self, interval: Duration) -> Self {
        self.session_refresh_interval = interval;
        self
    }

    /// Base URL without trailing slash
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.session_refresh_interval, Duration::from_secs(300));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TASTEBOOK_API_URL", "https://api.example.com/"),
            ("TASTEBOOK_ANON_KEY", "public-key"),
            ("TASTEBOOK_MAX_RETRIES", "5"),
            ("TASTEBOOK_TIMEOUT_MS", "2500"),
            ("TASTEBOOK_BASE_DELAY_MS", "not-a-number"),
        ]);
        let config = ClientConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_base(), "https://api.example.com");
        assert_eq!(config.anon_key, "public-key");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.timeout, Duration::from_millis(2500));
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
    }
}
