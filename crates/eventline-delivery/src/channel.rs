//! HTTP delivery channel
//!
//! Posts one JSON document per call. Retries live here, so callers see a
//! single success or a single exhausted failure per document.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{DeliveryError, Result};
use crate::retry::RetryPolicy;

/// Content type sent with every POST
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Time allowed to establish a connection
    #[serde(with = "crate::retry::duration_millis")]
    pub connect_timeout: Duration,

    /// Time allowed for the whole request, including reading the response
    #[serde(with = "crate::retry::duration_millis")]
    pub request_timeout: Duration,

    pub retry: RetryPolicy,

    pub user_agent: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            user_agent: format!("eventline/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ChannelConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Successful response from the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub body: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Transport used by the delivery workers
#[async_trait]
pub trait DeliveryChannel: Send + Sync + 'static {
    /// POST `body` to `endpoint`, succeeding only on a 2xx status
    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<DeliveryResponse>;
}

/// reqwest-backed channel
#[derive(Debug, Clone)]
pub struct HttpDeliveryChannel {
    client: reqwest::Client,
    config: ChannelConfig,
}

impl HttpDeliveryChannel {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DeliveryError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(ChannelConfig::default())
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    async fn attempt(&self, endpoint: &str, body: &[u8]) -> Result<(u16, String)> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read response body");
            String::new()
        });

        if status.is_success() {
            Ok((status.as_u16(), text))
        } else {
            Err(DeliveryError::Status {
                status: status.as_u16(),
                body: text,
            })
        }
    }

    fn classify(&self, err: reqwest::Error) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::Timeout(self.config.request_timeout.as_millis() as u64)
        } else if err.is_builder() {
            DeliveryError::configuration(err.to_string())
        } else if err.is_connect() {
            DeliveryError::transport(format!("connection failed: {err}"))
        } else {
            DeliveryError::transport(err.to_string())
        }
    }
}

#[async_trait]
impl DeliveryChannel for HttpDeliveryChannel {
    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<DeliveryResponse> {
        let bytes = serde_json::to_vec(body)?;
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            let delay = policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let span = info_span!("post", endpoint = %endpoint, attempt);
            let outcome = self.attempt(endpoint, &bytes).instrument(span).await;

            match outcome {
                Ok((status, body)) => {
                    debug!(
                        endpoint = %endpoint,
                        status,
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Delivered"
                    );
                    return Ok(DeliveryResponse {
                        status,
                        body,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && policy.has_attempts_remaining(attempt) => {
                    warn!(endpoint = %endpoint, attempt, error = %e, "Delivery attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_config_timeouts_are_milliseconds() {
        let config = ChannelConfig::default().with_request_timeout(Duration::from_millis(1500));
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["connect_timeout"], 5000);
        assert_eq!(value["request_timeout"], 1500);

        let parsed: ChannelConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }

    #[tokio::test]
    async fn test_successful_post() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/event"))
            .and(matchers::header("content-type", CONTENT_TYPE_JSON))
            .and(matchers::body_json(json!({"e": "click"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        let channel = HttpDeliveryChannel::with_defaults().unwrap();
        let response = channel
            .post(&format!("{}/v1/event", server.uri()), &json!({"e": "click"}))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "OK");
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test]
    async fn test_non_2xx_is_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let channel = HttpDeliveryChannel::with_defaults().unwrap();
        let err = channel
            .post(&format!("{}/v1/event", server.uri()), &json!({}))
            .await
            .unwrap_err();

        match err {
            DeliveryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, DeliveryError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let channel = HttpDeliveryChannel::with_defaults().unwrap();
        let response = channel.post(&server.uri(), &json!({})).await.unwrap();

        assert_eq!(response.status, 204);
        assert_eq!(response.attempts, 2);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Grab a free port, then close it so nothing is listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = HttpDeliveryChannel::with_defaults().unwrap();
        let err = channel
            .post(&format!("http://{addr}/v1/event"), &json!({}))
            .await
            .unwrap_err();

        match err {
            DeliveryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, DeliveryError::Transport(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = ChannelConfig::default()
            .with_request_timeout(Duration::from_millis(50))
            .with_retry(RetryPolicy::no_retry());
        let channel = HttpDeliveryChannel::new(config).unwrap();
        let err = channel.post(&server.uri(), &json!({})).await.unwrap_err();

        match err {
            DeliveryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert!(matches!(*last, DeliveryError::Timeout(50)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_not_retried() {
        let channel = HttpDeliveryChannel::with_defaults().unwrap();
        let err = channel.post("not a url", &json!({})).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration(_)));
    }
}
