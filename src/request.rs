use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Config, RetryPolicy};
use crate::{Error, Result, ACS_PATH, DISTRICTS_PATH, PARTS_PATH, STATES_PATH};

/// A single request to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Status and raw body of a response. Decoding is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request, no retries. A timeout is reported like any other transport failure.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// The real transport: one pooled `reqwest::Client` carrying the configured headers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .default_headers(config.headers.header_map()?)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        Ok(ApiResponse { status, body })
    }
}

/// Gateway client: builds endpoint requests and applies the retry policy uniformly.
#[derive(Debug)]
pub struct EciClient<T> {
    transport: T,
    base_url: String,
    retry: RetryPolicy,
    pub(crate) lookup_timeout: Duration,
    pub(crate) parts_timeout: Duration,
    pub(crate) page_size: u32,
    pub(crate) page_delay: Duration,
    pub(crate) max_pages: u32,
}

impl EciClient<HttpTransport> {
    /// Client talking to the real gateway.
    pub fn connect(config: &Config) -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new(config)?, config))
    }
}

impl<T: Transport> EciClient<T> {
    pub fn with_transport(transport: T, config: &Config) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
            lookup_timeout: config.lookup_timeout,
            parts_timeout: config.parts_timeout,
            page_size: config.page_size.max(1),
            page_delay: config.page_delay,
            max_pages: config.max_pages.max(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn states_url(&self) -> String {
        format!("{}{STATES_PATH}", self.base_url)
    }

    pub(crate) fn districts_url(&self, state_cd: &str) -> String {
        format!("{}{DISTRICTS_PATH}{state_cd}", self.base_url)
    }

    pub(crate) fn assemblies_url(&self, district_cd: &str) -> String {
        format!("{}{ACS_PATH}{district_cd}", self.base_url)
    }

    pub(crate) fn parts_url(&self) -> String {
        format!("{}{PARTS_PATH}", self.base_url)
    }

    /// Sends `request`, retrying per the policy.
    /// Returns the first 2xx response, or `Error::HttpStatus` for the last failing status.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 1;
        loop {
            debug!(method = %request.method, url = %request.url, attempt, "sending request");
            match self.transport.send(request).await {
                Ok(res) if res.is_success() => return Ok(res),
                Ok(res) if self.retry.should_retry_status(res.status, attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        url = %request.url,
                        status = res.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retryable status, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(res) => {
                    debug!(url = %request.url, status = res.status, body = %res.body, "request failed");
                    return Err(Error::HttpStatus {
                        status: res.status,
                        url: request.url.clone(),
                    });
                }
                Err(e) if self.retry.should_retry_transport(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(url = %request.url, error = %e, attempt, "transport error, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
            attempt += 1;
        }
    }
}
