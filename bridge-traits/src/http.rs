//! HTTP Client Abstraction
//!
//! Asset downloads are plain GET requests streamed to disk, so the surface
//! is intentionally narrow.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// Delay to wait before the given retry attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay.min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// Async HTTP client trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::HttpClient;
///
/// async fn fetch(client: &dyn HttpClient) -> Result<()> {
///     let mut reader = client.download_stream("https://cdn.example.com/Hour.mp3".into()).await?;
///     tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Download a resource with a GET request as a stream of bytes
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails, the request times out or the
    /// server answers with a non-2xx status.
    async fn download_stream(
        &self,
        url: String,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_policy_respects_max_delay() {
        let policy = RetryPolicy {
            max_delay: Duration::from_millis(250),
            ..Default::default()
        };

        assert_eq!(policy.delay_for(10), Duration::from_millis(250));
    }
}
