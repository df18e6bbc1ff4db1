//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, RetryPolicy},
};
use futures_util::TryStreamExt;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Provides asset downloads with:
/// - Connection pooling via reqwest
/// - Retry with exponential backoff on connect errors, 429 and 5xx
/// - TLS via rustls
/// - Streaming bodies (files are never buffered in memory)
pub struct ReqwestHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// Create a new HTTP client with a custom connect timeout
    ///
    /// No overall request timeout is set because asset bodies can take a
    /// while to stream; callers bound the whole transfer themselves.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("cutting-machinery-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            policy: RetryPolicy::default(),
        })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for downloads
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    async fn get_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.policy.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.policy.max_attempts,
                url = %url,
                "Executing download request"
            );

            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if Self::is_retryable_status(response.status()) => {
                    let status = response.status();
                    warn!(status = %status, attempt = attempt + 1, "Download failed with retryable status");
                    last_error = Some(BridgeError::OperationFailed(format!("HTTP error: {}", status)));
                }
                Ok(response) => {
                    // 4xx other than 429 will not improve with retries
                    return Err(BridgeError::OperationFailed(format!(
                        "HTTP error: {}",
                        response.status()
                    )));
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "Download request failed");
                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed("Request timed out".to_string())
                    } else if e.is_connect() {
                        BridgeError::OperationFailed(format!("Connection failed: {}", e))
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                }
            }

            attempt += 1;

            if attempt < self.policy.max_attempts {
                let delay = self.policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn download_stream(
        &self,
        url: String,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let response = self.get_with_retry(&url).await?;

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(ReqwestHttpClient::is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(ReqwestHttpClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!ReqwestHttpClient::is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_after_retries() {
        let client = ReqwestHttpClient::new().unwrap().with_retry_policy(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            use_exponential_backoff: false,
        });

        // Port 9 on localhost is the discard service and almost never listening.
        let result = client
            .download_stream("http://127.0.0.1:9/Hour.mp3".to_string())
            .await;

        assert!(result.is_err());
    }
}
