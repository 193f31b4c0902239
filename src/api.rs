use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::INVALID_DATE_MARKER;
use crate::config::UpstreamConfig;
use crate::error::CycleError;

/// How much of an error body to keep in a failure message.
const ERROR_BODY_PREVIEW: usize = 200;

/// Client for the affiliate stats endpoint.
pub struct StatsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    window_start: i64,
    end_time_margin: Duration,
}

/// Outcome of a single GET, before deciding on the fallback.
enum Response {
    Ok(String),
    InvalidDate,
    Failed(StatusCode, String),
}

impl StatsClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            window_start: config.window_start,
            end_time_margin: config.end_time_margin(),
        })
    }

    /// Window end for a fetch started now: the current time minus the safety margin.
    pub fn window_end_now(&self) -> i64 {
        chrono::Utc::now().timestamp() - self.end_time_margin.as_secs() as i64
    }

    /// Fetch stats for `[window_start, now - margin]`.
    pub async fn fetch_latest(&self) -> Result<Value, CycleError> {
        self.fetch(self.window_start, self.window_end_now()).await
    }

    /// Fetch the raw stats payload for the given window.
    ///
    /// If the upstream rejects the window with a 400 carrying the
    /// `INVALID_DATE` marker, the lifetime endpoint (no time parameters) is
    /// queried once instead. There is no further retry.
    pub async fn fetch(&self, window_start: i64, window_end: i64) -> Result<Value, CycleError> {
        debug!(
            "Fetching {} (startTime={window_start}, endTime={window_end})",
            self.redacted()
        );
        let window = [
            ("startTime", window_start.to_string()),
            ("endTime", window_end.to_string()),
        ];

        let body = match self.get(Some(&window[..])).await? {
            Response::Ok(body) => body,
            Response::InvalidDate => {
                warn!("Invalid date range, fetching lifetime stats instead");
                match self.get(None).await? {
                    Response::Ok(body) => body,
                    Response::InvalidDate => return Err(CycleError::InvalidDateRange),
                    Response::Failed(status, body) => return Err(unavailable(status, &body)),
                }
            }
            Response::Failed(status, body) => return Err(unavailable(status, &body)),
        };

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| CycleError::MalformedPayload(format!("malformed payload: {e}")))?;
        info!("Fetched stats payload ({} bytes)", body.len());
        Ok(payload)
    }

    async fn get(&self, window: Option<&[(&str, String)]>) -> Result<Response, CycleError> {
        let mut req = self.http.get(self.stats_url()?);
        if let Some(params) = window {
            req = req.query(params);
        }
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;
        debug!("Received status {status}");

        if status.is_success() {
            Ok(Response::Ok(body))
        } else if status == StatusCode::BAD_REQUEST && body.contains(INVALID_DATE_MARKER) {
            Ok(Response::InvalidDate)
        } else {
            Ok(Response::Failed(status, body))
        }
    }

    /// `{base}/stats/{api_key}`
    fn stats_url(&self) -> Result<Url, CycleError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CycleError::UpstreamUnavailable("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["stats", self.api_key.as_str()]);
        Ok(url)
    }

    /// Stats URL with the API key masked, for logs.
    fn redacted(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/stats/***")
    }
}

fn transport_error(e: reqwest::Error) -> CycleError {
    if e.is_timeout() {
        CycleError::UpstreamUnavailable("request timed out".to_string())
    } else {
        CycleError::UpstreamUnavailable(e.without_url().to_string())
    }
}

fn unavailable(status: StatusCode, body: &str) -> CycleError {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    warn!("Stats request failed with status {status}: {preview}");
    CycleError::UpstreamUnavailable(format!("status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{INVALID_DATE, ROWS, Upstream, serve};

    fn client(base_url: String, timeout_secs: u64) -> StatsClient {
        StatsClient::new(&UpstreamConfig {
            api_key: "test-key".to_string(),
            base_url,
            request_timeout_secs: timeout_secs,
            ..UpstreamConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn windowed_success_skips_fallback() {
        let up = Upstream::new((200, ROWS), (200, "[]"));
        let c = client(serve(up.clone()).await, 5);
        let payload = c.fetch(100, 200).await.unwrap();
        assert_eq!(payload[0]["username"], "A");
        assert_eq!(up.hits(), (1, 0));
    }

    #[tokio::test]
    async fn invalid_date_falls_back_once() {
        let up = Upstream::new((400, INVALID_DATE), (200, ROWS));
        let c = client(serve(up.clone()).await, 5);
        let payload = c.fetch(100, 200).await.unwrap();
        assert!(payload.is_array());
        assert_eq!(up.hits(), (1, 1));
    }

    #[tokio::test]
    async fn fallback_is_not_repeated() {
        let up = Upstream::new((400, INVALID_DATE), (400, INVALID_DATE));
        let c = client(serve(up.clone()).await, 5);
        let err = c.fetch(100, 200).await.unwrap_err();
        assert_eq!(err, CycleError::InvalidDateRange);
        assert_eq!(up.hits(), (1, 1));
    }

    #[tokio::test]
    async fn plain_400_does_not_fall_back() {
        let up = Upstream::new((400, r#"{"error":"BAD_KEY"}"#), (200, ROWS));
        let c = client(serve(up.clone()).await, 5);
        let err = c.fetch(100, 200).await.unwrap_err();
        assert!(matches!(err, CycleError::UpstreamUnavailable(_)));
        assert_eq!(up.hits(), (1, 0));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let up = Upstream::new((503, "down"), (200, ROWS));
        let c = client(serve(up.clone()).await, 5);
        let err = c.fetch(100, 200).await.unwrap_err();
        assert_eq!(
            err,
            CycleError::UpstreamUnavailable("status 503 Service Unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn fallback_failure_is_unavailable() {
        let up = Upstream::new((400, INVALID_DATE), (500, "boom"));
        let c = client(serve(up.clone()).await, 5);
        let err = c.fetch(100, 200).await.unwrap_err();
        assert!(matches!(err, CycleError::UpstreamUnavailable(_)));
        assert_eq!(up.hits(), (1, 1));
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed() {
        let up = Upstream::new((200, "<html>oops</html>"), (200, ROWS));
        let c = client(serve(up).await, 5);
        let err = c.fetch(100, 200).await.unwrap_err();
        match err {
            CycleError::MalformedPayload(msg) => assert!(msg.starts_with("malformed payload")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_upstream_times_out() {
        let mut up = Upstream::new((200, ROWS), (200, ROWS));
        up.delay = Duration::from_secs(5);
        let c = client(serve(up).await, 1);
        let err = c.fetch(100, 200).await.unwrap_err();
        assert_eq!(
            err,
            CycleError::UpstreamUnavailable("request timed out".to_string())
        );
    }

    #[tokio::test]
    async fn connection_refused_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let c = client(format!("http://{addr}"), 2);
        let err = c.fetch(100, 200).await.unwrap_err();
        assert!(matches!(err, CycleError::UpstreamUnavailable(_)));
    }

    #[test]
    fn stats_url_embeds_key() {
        let c = client("https://affiliate.example".to_string(), 5);
        assert_eq!(
            c.stats_url().unwrap().as_str(),
            "https://affiliate.example/stats/test-key"
        );
        let c = client("https://affiliate.example/v1/".to_string(), 5);
        assert_eq!(
            c.stats_url().unwrap().as_str(),
            "https://affiliate.example/v1/stats/test-key"
        );
        assert!(!c.redacted().contains("test-key"));
    }

    #[test]
    fn window_end_trails_now_by_margin() {
        let c = client("https://affiliate.example".to_string(), 5);
        let now = chrono::Utc::now().timestamp();
        let end = c.window_end_now();
        assert!(end <= now - 15 && end >= now - 17);
    }
}
