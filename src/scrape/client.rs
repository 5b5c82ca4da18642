use futures::StreamExt;
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;

const MAX_RETRIES: u32 = 3;
const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 5;

/// Errors from fetching one page of the site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// HTTP access to the scraped site: one shared connection pool, a fixed
/// user agent, a per-request timeout and bounded retries.
///
/// Clones share the pacing clock, so the request delay holds across every
/// handle to the same client.
#[derive(Debug, Clone)]
pub struct SiteClient {
    http: reqwest::Client,
    timeout: Duration,
    backoff_unit: Duration,
    request_delay: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl SiteClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(redirect_policy())
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            timeout,
            backoff_unit: Duration::from_secs(1),
            request_delay: Duration::ZERO,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(&config.user_agent, config.request_timeout())?
            .with_request_delay(config.request_delay()))
    }

    /// Minimum spacing between the starts of consecutive requests.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Scales the retry backoff. Retry `n` waits `unit * 2^n`.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// GETs `url` and returns the body decoded as UTF-8 (lossily).
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] - a single attempt exceeded the timeout
    /// - [`FetchError::HttpStatus`] - 4xx, or 5xx after max retries
    /// - [`FetchError::RateLimited`] - 429 after max retries
    /// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
    /// - [`FetchError::IncompleteResponse`] - short body after max retries
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            self.pace().await;

            let response = tokio::time::timeout(self.timeout, self.http.get(url).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout
                    } else {
                        FetchError::Network(e)
                    }
                })?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= MAX_RETRIES {
                    return Err(FetchError::RateLimited(MAX_RETRIES));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(FetchError::HttpStatus(status.as_u16()));
                }
                let delay = self.backoff(retry_count);
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            match read_limited_bytes(response, MAX_PAGE_SIZE).await {
                Ok(bytes) => {
                    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched page");
                    return Ok(bytes);
                }
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= MAX_RETRIES {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }
                    let delay = self.backoff(retry_count);
                    tracing::debug!(
                        url = %url,
                        expected = expected,
                        received = received,
                        attempt = retry_count + 1,
                        "Retrying incomplete download"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Waits until `request_delay` has passed since the previous request.
    async fn pace(&self) {
        if self.request_delay.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.request_delay).await;
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.pow(retry))
    }
}

/// Follows at most a handful of redirects and refuses loops.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // A dropped connection can end the stream early without an error.
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> SiteClient {
        SiteClient::new("TestBot/1.0", Duration::from_secs(5))
            .unwrap()
            .with_backoff_unit(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_text_success_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/category/news/"))
            .and(header("user-agent", "TestBot/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = client()
            .get_text(&format!("{}/category/news/", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_404_fails_without_retry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client().get_text(&mock_server.uri()).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_500_retries_then_fails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4) // Initial request + 3 retries
            .mount(&mock_server)
            .await;

        match client().get_text(&mock_server.uri()).await {
            Err(FetchError::HttpStatus(500)) => {}
            other => panic!("Expected HttpStatus(500), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(any())
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&mock_server)
            .await;

        let body = client().get_text(&mock_server.uri()).await.unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_429_exhausts_retries() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&mock_server)
            .await;

        match client().get_text(&mock_server.uri()).await {
            Err(FetchError::RateLimited(3)) => {}
            other => panic!("Expected RateLimited(3), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let client = SiteClient::new("TestBot/1.0", Duration::from_millis(50)).unwrap();
        match client.get_text(&mock_server.uri()).await {
            Err(FetchError::Timeout) => {}
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; MAX_PAGE_SIZE + 1]))
            .mount(&mock_server)
            .await;

        match client().get_text(&mock_server.uri()).await {
            Err(FetchError::ResponseTooLarge) => {}
            other => panic!("Expected ResponseTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_delay_spaces_requests() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client().with_request_delay(Duration::from_millis(200));
        let started = std::time::Instant::now();
        client.get_text(&mock_server.uri()).await.unwrap();
        client.clone().get_text(&mock_server.uri()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_backoff_doubles() {
        let client = client();
        assert_eq!(client.backoff(0), Duration::from_millis(1));
        assert_eq!(client.backoff(1), Duration::from_millis(2));
        assert_eq!(client.backoff(2), Duration::from_millis(4));
    }
}
