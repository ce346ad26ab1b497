//! HTTP fetching with bounded time and size.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use std::time::Instant;

use crate::config::FetchConfig;
use crate::errors::InsightError;

/// Reason recorded when a fetch exceeds its time budget.
pub const TIMEOUT_REASON: &str = "timeout";

/// Reason recorded when a body exceeds `max_response_size`.
pub const TOO_LARGE_REASON: &str = "response too large";

/// Result of a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body as text.
    pub text: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// Content type from headers.
    pub content_type: Option<String>,
    /// Time taken to fetch in milliseconds.
    pub duration_ms: f64,
}

impl FetchResult {
    /// The lowercased media type without parameters, if any.
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_ref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Whether the response is HTML.
    ///
    /// A response without a content type counts as HTML when its body starts
    /// with markup.
    #[must_use]
    pub fn is_html(&self) -> bool {
        match self.media_type() {
            Some(mt) => mt == "text/html" || mt == "application/xhtml+xml",
            None => looks_like_html(&self.text),
        }
    }

    /// Whether the response is plain text.
    #[must_use]
    pub fn is_plain_text(&self) -> bool {
        self.media_type().as_deref() == Some("text/plain")
    }

    /// Whether the fetch was successful (2xx status).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start()
        .chars()
        .take(15)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<head")
}

/// Protocol for HTTP fetching.
///
/// Errors should be [`InsightError::FetchFailed`] carrying a classified
/// reason; any other error is recorded as a network error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a URL and returns the result.
    async fn fetch(&self, url: &str) -> Result<FetchResult, InsightError>;
}

/// `reqwest`-backed fetcher with connect and total timeouts, a redirect
/// limit, and a response size cap.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Creates a fetcher from configuration.
    pub fn new(config: FetchConfig) -> Result<Self, InsightError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| InsightError::Config(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| InsightError::Config(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Gets the configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn classify(url: &str, err: &reqwest::Error) -> InsightError {
    if err.is_timeout() {
        InsightError::fetch_failed(url, TIMEOUT_REASON)
    } else if err.is_redirect() {
        InsightError::fetch_failed(url, "network error: too many redirects")
    } else {
        InsightError::fetch_failed(url, format!("network error: {err}"))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, InsightError> {
        let start = Instant::now();
        let mut response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(|e| classify(url, &e))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let max = self.config.max_response_size;
        let mut body = Vec::new();
        if response.status().is_success() {
            if response.content_length().is_some_and(|len| len > max as u64) {
                return Err(InsightError::fetch_failed(url, TOO_LARGE_REASON));
            }
            while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, &e))? {
                if body.len() + chunk.len() > max {
                    return Err(InsightError::fetch_failed(url, TOO_LARGE_REASON));
                }
                body.extend_from_slice(&chunk);
            }
        }

        Ok(FetchResult {
            status_code,
            headers,
            text: String::from_utf8_lossy(&body).into_owned(),
            final_url,
            content_type,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `response` to every connection after `delay_ms`, returning the
    /// base URL.
    async fn serve(response: String, delay_ms: u64) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let response = response.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn fetch_reason(err: InsightError) -> String {
        match err {
            InsightError::FetchFailed { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    fn result_with(content_type: Option<&str>, text: &str) -> FetchResult {
        FetchResult {
            status_code: 200,
            headers: HashMap::new(),
            text: text.to_string(),
            final_url: "https://example.com".to_string(),
            content_type: content_type.map(String::from),
            duration_ms: 1.0,
        }
    }

    #[test]
    fn test_fetch_result_content_types() {
        assert!(result_with(Some("text/html; charset=utf-8"), "").is_html());
        assert!(result_with(Some("application/xhtml+xml"), "").is_html());
        assert!(result_with(Some("TEXT/PLAIN"), "").is_plain_text());
        assert!(!result_with(Some("application/json"), "{}").is_html());
        assert!(result_with(None, "  <!DOCTYPE html><html></html>").is_html());
        assert!(!result_with(None, "just words").is_html());
    }

    #[test]
    fn test_fetch_result_is_success() {
        let ok = result_with(None, "");
        assert!(ok.is_success());
        assert!(!FetchResult { status_code: 404, ..ok.clone() }.is_success());
        assert!(!FetchResult { status_code: 301, ..ok }.is_success());
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let err = HttpFetcher::new(FetchConfig::new().with_header("bad header", "x")).unwrap_err();
        assert_eq!(err.code(), "config");
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let base = serve(
            http_response("200 OK", "text/html; charset=utf-8", "<html><body>hi</body></html>"),
            0,
        )
        .await;
        let fetcher = HttpFetcher::new(FetchConfig::new()).unwrap();
        let result = fetcher.fetch(&format!("{base}/page")).await.unwrap();

        assert!(result.is_success());
        assert!(result.is_html());
        assert_eq!(result.text, "<html><body>hi</body></html>");
        assert!(result.final_url.ends_with("/page"));
    }

    #[tokio::test]
    async fn test_fetch_reports_status() {
        let base = serve(http_response("404 Not Found", "text/html", "missing"), 0).await;
        let fetcher = HttpFetcher::new(FetchConfig::new()).unwrap();
        let result = fetcher.fetch(&base).await.unwrap();
        assert_eq!(result.status_code, 404);
        assert!(result.text.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let base = serve(http_response("200 OK", "text/html", "late"), 2_000).await;
        let fetcher = HttpFetcher::new(FetchConfig::new().with_timeout(0.2)).unwrap();
        let err = fetcher.fetch(&base).await.unwrap_err();
        assert_eq!(fetch_reason(err), TIMEOUT_REASON);
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let body = "x".repeat(4096);
        let base = serve(http_response("200 OK", "text/plain", &body), 0).await;
        let config = FetchConfig {
            max_response_size: 1024,
            ..FetchConfig::new()
        };
        let fetcher = HttpFetcher::new(config).unwrap();
        let err = fetcher.fetch(&base).await.unwrap_err();
        assert_eq!(fetch_reason(err), TOO_LARGE_REASON);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(FetchConfig::new().with_timeout(2.0)).unwrap();
        let err = fetcher.fetch(&format!("http://{addr}/")).await.unwrap_err();
        assert!(fetch_reason(err).starts_with("network error"));
    }
}
