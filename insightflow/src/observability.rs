//! Observability hooks for the fetch stage.

use tracing::debug;

/// Observability callbacks for fetch operations.
pub trait FetchObserver: Send + Sync {
    /// Called when a fetch starts.
    fn on_fetch_start(&self, url: &str, request_id: &str);

    /// Called when a response has been received.
    fn on_fetch_complete(&self, url: &str, request_id: &str, duration_ms: f64, status_code: u16);

    /// Called when a URL is classified as failed.
    fn on_fetch_error(&self, url: &str, request_id: &str, error: &str);

    /// Called when readable text has been extracted.
    fn on_extract_complete(&self, url: &str, request_id: &str, duration_ms: f64, text_len: usize);
}

/// No-op implementation of `FetchObserver`.
#[derive(Debug, Clone, Default)]
pub struct NoOpFetchObserver;

impl FetchObserver for NoOpFetchObserver {
    fn on_fetch_start(&self, _url: &str, _request_id: &str) {}
    fn on_fetch_complete(&self, _url: &str, _request_id: &str, _duration_ms: f64, _status_code: u16) {}
    fn on_fetch_error(&self, _url: &str, _request_id: &str, _error: &str) {}
    fn on_extract_complete(&self, _url: &str, _request_id: &str, _duration_ms: f64, _text_len: usize) {}
}

/// Logs every fetch event through `tracing` at debug level.
#[derive(Debug, Clone, Default)]
pub struct TracingFetchObserver;

impl FetchObserver for TracingFetchObserver {
    fn on_fetch_start(&self, url: &str, request_id: &str) {
        debug!(url, request_id, "Fetch started");
    }

    fn on_fetch_complete(&self, url: &str, request_id: &str, duration_ms: f64, status_code: u16) {
        debug!(url, request_id, duration_ms, status_code, "Fetch complete");
    }

    fn on_fetch_error(&self, url: &str, request_id: &str, error: &str) {
        debug!(url, request_id, error, "Fetch failed");
    }

    fn on_extract_complete(&self, url: &str, request_id: &str, duration_ms: f64, text_len: usize) {
        debug!(url, request_id, duration_ms, text_len, "Extraction complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingFetchObserver;

    #[test]
    fn test_noop_observer() {
        let observer = NoOpFetchObserver;
        observer.on_fetch_start("https://example.com", "req-1");
        observer.on_fetch_complete("https://example.com", "req-1", 100.0, 200);
        observer.on_fetch_error("https://example.com", "req-1", "timeout");
        observer.on_extract_complete("https://example.com", "req-1", 5.0, 1000);
    }

    #[test]
    fn test_tracing_observer_does_not_panic_without_subscriber() {
        let observer = TracingFetchObserver;
        observer.on_fetch_start("https://example.com", "req-1");
        observer.on_fetch_error("https://example.com", "req-1", "http status 500");
    }

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingFetchObserver::default();
        observer.on_fetch_start("https://a.example/", "r1");
        observer.on_fetch_error("https://a.example/", "r1", "timeout");
        assert_eq!(
            observer.events(),
            vec![
                "start https://a.example/".to_string(),
                "error https://a.example/ timeout".to_string(),
            ]
        );
    }
}
