//! Retrying HTTP fetches over a pluggable transport.
//!
//! Every attempt is classified into one of three outcomes. Transport errors
//! and 5xx responses are retried up to the attempt budget, with an optional
//! exponential backoff in between. Any other non-2xx status fails at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::encoding::decode_html;
use crate::types::{CollectorError, CollectorResult, FetchError, FetchErrorKind};

/// Default user agent sent by [`ReqwestTransport`].
pub const DEFAULT_USER_AGENT: &str = concat!("hybrid-collector/", env!("CARGO_PKG_VERSION"));

/// A request as handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Failure below the HTTP status layer.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Malformed requests fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(e) => !e.is_builder(),
            TransportError::Other(_) => true,
        }
    }
}

/// Sends one request and reads the whole response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> CollectorResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| {
                CollectorError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Delay schedule between retryable attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Retry immediately.
    pub const NONE: Backoff = Backoff {
        base: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(500), Duration::from_secs(10))
    }
}

/// Timeout, attempt budget and backoff for one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl FetchPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Disposition of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(HttpResponse),
    Retryable {
        status: Option<u16>,
        error: Option<TransportError>,
    },
    Terminal {
        status: Option<u16>,
        error: Option<TransportError>,
    },
}

/// Classify the result of one attempt.
pub fn classify(result: Result<HttpResponse, TransportError>) -> AttemptOutcome {
    match result {
        Ok(response) => match response.status {
            200..=299 => AttemptOutcome::Success(response),
            500..=599 => AttemptOutcome::Retryable {
                status: Some(response.status),
                error: None,
            },
            status => AttemptOutcome::Terminal {
                status: Some(status),
                error: None,
            },
        },
        Err(error) if error.is_retryable() => AttemptOutcome::Retryable {
            status: None,
            error: Some(error),
        },
        Err(error) => AttemptOutcome::Terminal {
            status: None,
            error: Some(error),
        },
    }
}

/// A successful fetch and how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub payload: T,
    pub status: u16,
    pub attempts: u32,
}

/// Runs requests through a [`Transport`] under a [`FetchPolicy`].
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    policy: FetchPolicy,
}

impl RetryingFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: FetchPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetch until success, a terminal failure, or the budget runs out.
    pub async fn fetch(&self, request: &HttpRequest) -> Result<Fetched<HttpResponse>, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let url = request.url.as_str();
        let mut last_status = None;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(%url, method = %request.method, attempt, max_attempts, "sending request");
            let result = self.transport.send(request, self.policy.timeout).await;

            match classify(result) {
                AttemptOutcome::Success(response) => {
                    debug!(%url, status = response.status, attempt, "request succeeded");
                    return Ok(Fetched {
                        status: response.status,
                        payload: response,
                        attempts: attempt,
                    });
                }
                AttemptOutcome::Terminal { status, error } => {
                    let err = match error {
                        Some(e) => FetchError::new(
                            FetchErrorKind::InvalidRequest,
                            url,
                            "Request could not be sent",
                        )
                        .with_source(e),
                        None => FetchError::new(FetchErrorKind::Status, url, "Request failed")
                            .with_status(status),
                    };
                    return Err(err.with_attempts(attempt));
                }
                AttemptOutcome::Retryable { status, error } => {
                    match (&status, &error) {
                        (Some(s), _) => warn!(%url, status = s, attempt, max_attempts, "server error"),
                        (None, Some(e)) => warn!(%url, error = %e, attempt, max_attempts, "transport error"),
                        (None, None) => {}
                    }
                    if status.is_some() {
                        last_status = status;
                    }
                    if error.is_some() {
                        last_error = error;
                    }
                    if attempt < max_attempts {
                        let delay = self.policy.backoff.delay(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let mut err = FetchError::new(
            FetchErrorKind::Exhausted,
            url,
            format!("Request failed after {max_attempts} attempts"),
        )
        .with_status(last_status)
        .with_attempts(max_attempts);
        if let Some(e) = last_error {
            err = err.with_source(e);
        }
        Err(err)
    }

    /// Fetch and parse the body as JSON. A bad body is not retried.
    pub async fn fetch_json(&self, request: &HttpRequest) -> Result<Fetched<Value>, FetchError> {
        let fetched = self.fetch(request).await?;
        let payload = serde_json::from_slice(&fetched.payload.body).map_err(|e| {
            FetchError::new(
                FetchErrorKind::InvalidJson,
                &request.url,
                "API response was not valid JSON",
            )
            .with_status(Some(fetched.status))
            .with_attempts(fetched.attempts)
            .with_source(e)
        })?;
        Ok(Fetched {
            payload,
            status: fetched.status,
            attempts: fetched.attempts,
        })
    }

    /// Fetch and decode the body as HTML text.
    pub async fn fetch_html(&self, request: &HttpRequest) -> Result<Fetched<String>, FetchError> {
        let fetched = self.fetch(request).await?;
        let response = fetched.payload;
        let text = decode_html(&response.body, response.content_type.as_deref());
        Ok(Fetched {
            payload: text,
            status: fetched.status,
            attempts: fetched.attempts,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays canned results and records every request.
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: &HttpRequest,
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
        }
    }

    pub fn no_backoff(max_attempts: u32) -> FetchPolicy {
        FetchPolicy::default()
            .with_max_attempts(max_attempts)
            .with_backoff(Backoff::NONE)
    }
}
