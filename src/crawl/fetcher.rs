use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::cache::ResponseCache;
use super::politeness::Politeness;
use crate::config::CrawlConfig;

const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a page or probing an enclosure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// URL has no host to rate-limit against
    #[error("URL has no host: {0}")]
    NoHost(String),
}

/// Headers returned by a HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// Page-fetch engine shared by all crawl stages.
///
/// Owns the HTTP client, the per-host [`Politeness`] limiter, the optional
/// [`ResponseCache`], and the set of URLs already scheduled this run.
#[derive(Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    politeness: Politeness,
    cache: Option<ResponseCache>,
    visited: Mutex<HashSet<String>>,
    request_timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            politeness: Politeness::new(
                config.parallelism,
                config.delay(),
                config.random_delay(),
            ),
            cache: config.cache_dir.clone().map(ResponseCache::new),
            visited: Mutex::new(HashSet::new()),
            request_timeout: config.request_timeout(),
        })
    }

    /// Marks `url` as scheduled. Returns `false` if it already was, in which
    /// case the caller must not fetch it again.
    pub fn claim(&self, url: &Url) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.as_str().to_string())
    }

    /// Fetches a page body as text, serving it from the cache when possible.
    ///
    /// Cache hits skip the politeness delay. Successful network responses
    /// are written back to the cache; a cache write failure is logged and
    /// otherwise ignored.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        if let Some(cache) = &self.cache {
            match cache.get(url).await {
                Ok(Some(body)) => {
                    tracing::debug!(url = %url, "Serving page from cache");
                    return Ok(body);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(url = %url, error = %e, "Cache read failed"),
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::NoHost(url.to_string()))?;
        let permit = self.politeness.acquire(host).await;
        tracing::info!(url = %url, "Visiting page");

        let bytes = tokio::time::timeout(self.request_timeout, async {
            let response = self.client.get(url.as_str()).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }
            read_limited_bytes(response, MAX_PAGE_SIZE).await
        })
        .await
        .map_err(|_| FetchError::Timeout(self.request_timeout))??;
        drop(permit);

        let body = String::from_utf8_lossy(&bytes).into_owned();

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(url, &body).await {
                tracing::warn!(url = %url, error = %e, "Cache write failed");
            }
        }

        Ok(body)
    }

    /// Issues a HEAD request and returns the enclosure-relevant headers.
    ///
    /// Any HTTP status is returned as-is; only transport failures and the
    /// deadline produce errors.
    pub async fn probe(&self, url: &Url) -> Result<ProbeResponse, FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::NoHost(url.to_string()))?;
        let _permit = self.politeness.acquire(host).await;

        let response = tokio::time::timeout(self.request_timeout, self.client.head(url.as_str()).send())
            .await
            .map_err(|_| FetchError::Timeout(self.request_timeout))??;

        // Read the header directly: the body of a HEAD response is always empty
        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_length,
            content_type,
        })
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
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

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(cache_dir: Option<std::path::PathBuf>) -> CrawlConfig {
        CrawlConfig {
            delay_ms: 0,
            random_delay_ms: 0,
            request_timeout_secs: 5,
            cache_dir,
            ..CrawlConfig::default()
        }
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_claim_dedups() {
        let fetcher = Fetcher::new(&config(None)).unwrap();
        let a = Url::parse("https://www.gcores.com/radios?page=2").unwrap();
        assert!(fetcher.claim(&a));
        assert!(!fetcher.claim(&a));
        assert!(fetcher.claim(&Url::parse("https://www.gcores.com/radios?page=3").unwrap()));
    }

    #[tokio::test]
    async fn test_get_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/radios"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(None)).unwrap();
        let body = fetcher.get_text(&url(&server, "/radios?page=1")).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_get_text_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(None)).unwrap();
        match fetcher.get_text(&url(&server, "/missing")).await {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_text_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&CrawlConfig {
            request_timeout_secs: 1,
            ..config(None)
        })
        .unwrap();
        match fetcher.get_text(&url(&server, "/slow")).await {
            Err(FetchError::Timeout(_)) => {}
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cache_serves_second_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("cached body"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join("gadio_feed_fetcher_cache_test");
        std::fs::remove_dir_all(&dir).ok();
        let target = url(&server, "/radios/1");

        let first = Fetcher::new(&config(Some(dir.clone()))).unwrap();
        assert_eq!(first.get_text(&target).await.unwrap(), "cached body");

        let second = Fetcher::new(&config(Some(dir.clone()))).unwrap();
        assert_eq!(second.get_text(&target).await.unwrap(), "cached body");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_error_responses_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join("gadio_feed_fetcher_no_cache_test");
        std::fs::remove_dir_all(&dir).ok();
        let fetcher = Fetcher::new(&config(Some(dir.clone()))).unwrap();
        let target = url(&server, "/radios/2");

        assert!(fetcher.get_text(&target).await.is_err());
        assert!(fetcher.get_text(&target).await.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_probe_reads_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/audio.mp3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "audio/mpeg")
                    .set_body_bytes(vec![0u8; 2048]),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(None)).unwrap();
        let probe = fetcher.probe(&url(&server, "/audio.mp3")).await.unwrap();
        assert_eq!(probe.status, 200);
        assert_eq!(probe.content_length, Some(2048));
        assert_eq!(probe.content_type.as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let fetcher = Fetcher::new(&config(None)).unwrap();
        let result = fetcher
            .probe(&Url::parse("http://127.0.0.1:1/audio.mp3").unwrap())
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
