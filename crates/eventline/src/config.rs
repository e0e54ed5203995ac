// Tracker configuration
//
// Built in code or loaded from environment variables.

use std::env;
use std::time::Duration;

use eventline_delivery::{ChannelConfig, RetryPolicy, DEFAULT_PROFILE_CONCURRENCY};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Default collector event endpoint
pub const DEFAULT_EVENT_ENDPOINT: &str = "http://localhost:8079/v1/event";

/// Default collector profile endpoint
pub const DEFAULT_PROFILE_ENDPOINT: &str = "http://localhost:8079/v1/profile";

/// Configuration for a [`Tracker`](crate::Tracker)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Client token issued by the collector
    pub token: String,

    pub event_endpoint: String,

    pub profile_endpoint: String,

    #[serde(with = "eventline_delivery::duration_millis")]
    pub connect_timeout: Duration,

    #[serde(with = "eventline_delivery::duration_millis")]
    pub request_timeout: Duration,

    /// Attempts per POST, including the first
    pub max_attempts: u32,

    /// Delay between attempts; zero retries immediately
    #[serde(with = "eventline_delivery::duration_millis")]
    pub retry_interval: Duration,

    /// Concurrent profile workers
    pub profile_concurrency: usize,
}

impl TrackerConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            event_endpoint: DEFAULT_EVENT_ENDPOINT.to_string(),
            profile_endpoint: DEFAULT_PROFILE_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_interval: Duration::ZERO,
            profile_concurrency: DEFAULT_PROFILE_CONCURRENCY,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `EVENTLINE_TOKEN`: client token (required)
    /// - `EVENTLINE_EVENT_ENDPOINT`: event endpoint (default: http://localhost:8079/v1/event)
    /// - `EVENTLINE_PROFILE_ENDPOINT`: profile endpoint (default: http://localhost:8079/v1/profile)
    /// - `EVENTLINE_CONNECT_TIMEOUT_MS`: connect timeout (default: 5000)
    /// - `EVENTLINE_REQUEST_TIMEOUT_MS`: request timeout (default: 10000)
    /// - `EVENTLINE_MAX_ATTEMPTS`: attempts per POST (default: 3)
    /// - `EVENTLINE_RETRY_INTERVAL_MS`: delay between attempts (default: 0)
    /// - `EVENTLINE_PROFILE_CONCURRENCY`: profile workers (default: 5)
    pub fn from_env() -> Result<Self> {
        let token = env::var("EVENTLINE_TOKEN")
            .map_err(|_| TrackerError::configuration("EVENTLINE_TOKEN is not set"))?;
        let defaults = Self::new(token);

        let config = Self {
            event_endpoint: env::var("EVENTLINE_EVENT_ENDPOINT")
                .unwrap_or(defaults.event_endpoint.clone()),
            profile_endpoint: env::var("EVENTLINE_PROFILE_ENDPOINT")
                .unwrap_or(defaults.profile_endpoint.clone()),
            connect_timeout: env_millis("EVENTLINE_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout),
            request_timeout: env_millis("EVENTLINE_REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout),
            max_attempts: env_parse("EVENTLINE_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            retry_interval: env_millis("EVENTLINE_RETRY_INTERVAL_MS")
                .unwrap_or(defaults.retry_interval),
            profile_concurrency: env_parse("EVENTLINE_PROFILE_CONCURRENCY")
                .unwrap_or(defaults.profile_concurrency),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_event_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.event_endpoint = endpoint.into();
        self
    }

    pub fn with_profile_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.profile_endpoint = endpoint.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_profile_concurrency(mut self, concurrency: usize) -> Self {
        self.profile_concurrency = concurrency.max(1);
        self
    }

    /// Reject configurations the tracker cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(TrackerError::configuration("token must not be empty"));
        }
        for (name, endpoint) in [
            ("event_endpoint", &self.event_endpoint),
            ("profile_endpoint", &self.profile_endpoint),
        ] {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(TrackerError::configuration(format!(
                    "{name} must be an http(s) URL, got {endpoint:?}"
                )));
            }
        }
        if self.max_attempts == 0 {
            return Err(TrackerError::configuration("max_attempts must be at least 1"));
        }
        if self.profile_concurrency == 0 {
            return Err(TrackerError::configuration(
                "profile_concurrency must be at least 1",
            ));
        }
        Ok(())
    }

    /// HTTP channel settings derived from this configuration
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::default()
            .with_connect_timeout(self.connect_timeout)
            .with_request_timeout(self.request_timeout)
            .with_retry(RetryPolicy::fixed(self.retry_interval, self.max_attempts))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::new("token");
        assert_eq!(config.event_endpoint, DEFAULT_EVENT_ENDPOINT);
        assert_eq!(config.profile_endpoint, DEFAULT_PROFILE_ENDPOINT);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.profile_concurrency, 5);
        config.validate().unwrap();
    }

    #[test]
    fn test_channel_config_carries_retry_budget() {
        let channel = TrackerConfig::new("token")
            .with_max_attempts(4)
            .with_request_timeout(Duration::from_secs(2))
            .channel_config();

        assert_eq!(channel.retry.max_attempts, 4);
        assert_eq!(channel.retry.delay_for_attempt(2), Duration::ZERO);
        assert_eq!(channel.request_timeout, Duration::from_secs(2));
        assert_eq!(channel.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(TrackerConfig::new("  ").validate().is_err());
        assert!(TrackerConfig::new("t")
            .with_event_endpoint("localhost:8079")
            .validate()
            .is_err());
        assert!(TrackerConfig::new("t").with_max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let config = TrackerConfig::new("token");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["connect_timeout"], 5000);
        assert_eq!(json["request_timeout"], 10000);

        let parsed: TrackerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }
}
