use crate::encoding::decode_body;
use crate::error::{FetchError, Result};
use crate::pacing::{RetryPolicy, sleep_or_cancel};
use encoding_rs::Encoding;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Everything that shapes an outgoing request. Built once per run and handed to
/// every component that fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub accept_language: Option<String>,
    pub connect_timeout_secs: f64,
    pub read_timeout_secs: f64,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: Some("ja,en;q=0.8".to_string()),
            connect_timeout_secs: 30.0,
            read_timeout_secs: 47.5,
            retry: RetryPolicy::default(),
        }
    }
}

/// A successful (2xx) response with its body fully read.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }

    /// Body as text, honouring an explicit encoding before any detection.
    pub fn text(&self, override_encoding: Option<&'static Encoding>) -> String {
        let host = Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        decode_body(
            &self.body,
            self.content_type.as_deref(),
            host.as_deref(),
            override_encoding,
        )
    }
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    config: ClientConfig,
}

impl HttpFetcher {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(lang) = &config.accept_language
            && let Ok(value) = HeaderValue::from_str(lang)
        {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs_f64(config.connect_timeout_secs.max(0.0)))
            .read_timeout(Duration::from_secs_f64(config.read_timeout_secs.max(0.0)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET `url`, retrying transient failures per the retry policy.
    pub async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPage, FetchError> {
        self.get_with_timeout(url, None, cancel).await
    }

    /// GET with an overall per-request timeout on top of the connect/read timeouts.
    pub async fn get_with_timeout(
        &self,
        url: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        self.send_with_retries(url, cancel, || {
            let request = self.client.get(parsed.clone());
            match timeout {
                Some(t) => request.timeout(t),
                None => request,
            }
        })
        .await
    }

    /// GET with query parameters, used for the JSON search API.
    pub async fn get_query(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        self.send_with_retries(url, cancel, || {
            let request = self.client.get(parsed.clone()).query(query);
            match timeout {
                Some(t) => request.timeout(t),
                None => request,
            }
        })
        .await
    }

    async fn send_with_retries<F>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        build: F,
    ) -> std::result::Result<FetchedPage, FetchError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let policy = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            attempt += 1;

            let outcome = tokio::select! {
                outcome = Self::send_once(url, build()) => outcome,
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            };

            match outcome {
                Err(FetchError::Transient { reason, .. }) if attempt > policy.max_retries => {
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        reason,
                    });
                }
                Err(FetchError::Transient { reason, .. }) => {
                    let backoff = policy.calculate_backoff(attempt);
                    warn!(
                        "Transient failure on {} ({}), retry {}/{} in {:?}",
                        url, reason, attempt, policy.max_retries, backoff
                    );
                    if !sleep_or_cancel(backoff, cancel).await {
                        return Err(FetchError::Cancelled);
                    }
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<FetchedPage, FetchError> {
        debug!("Fetching {}", url);

        let response = request.send().await.map_err(|e| classify_transport_error(url, e))?;
        let status = response.status();

        if is_retryable_status(status) {
            return Err(FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(url, e))?;

        Ok(FetchedPage {
            url: final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_builder() {
        return FetchError::InvalidUrl(format!("{url}: {error}"));
    }
    if error.is_decode() {
        return FetchError::Malformed {
            url: url.to_string(),
            reason: error.to_string(),
        };
    }
    // timeouts, refused/reset connections, DNS failures and truncated bodies
    FetchError::Transient {
        url: url.to_string(),
        reason: error.to_string(),
    }
}
