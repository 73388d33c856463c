use std::time::{Duration, Instant};

use async_trait::async_trait;
use derma_core::capabilities::{HttpHeader, HttpRequest, HttpResponse, HttpResult};
use tracing::{debug, warn};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes the core's HTTP requests. Any status code is a response; only
/// failures to get one are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> HttpResult;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::default(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ReqwestTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn classify(err: &reqwest::Error) -> crux_http::Error {
        if err.is_timeout() {
            crux_http::Error::Timeout
        } else if err.is_builder() {
            crux_http::Error::Url(err.to_string())
        } else {
            crux_http::Error::Io(err.to_string())
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, crux_http::Error> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| crux_http::Error::Url(format!("{}: {e}", request.method)))?;
        let url = url::Url::parse(&request.url)?;

        let mut builder = self.client.request(method, url).timeout(self.timeout);
        for HttpHeader { name, value } in request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(|e| Self::classify(&e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| HttpHeader {
                    name: name.as_str().to_string(),
                    value: value.to_string(),
                })
            })
            .collect();
        let body = response.bytes().await.map_err(|e| Self::classify(&e))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> HttpResult {
        let started = Instant::now();
        let method = request.method.clone();
        let url = request.url.clone();
        debug!(%method, %url, "sending request");

        match self.send(request).await {
            Ok(response) => {
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                debug!(
                    %method,
                    %url,
                    status = response.status,
                    bytes = response.body.len(),
                    duration_ms,
                    "response received"
                );
                HttpResult::Ok(response)
            }
            Err(err) => {
                warn!(%method, %url, error = %err, "request failed");
                HttpResult::Err(err)
            }
        }
    }
}
