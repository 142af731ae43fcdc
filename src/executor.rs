use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GenerateError, Result};
use crate::provider::{ProviderAdapter, ProviderConfig};

/// A provider-agnostic JSON POST.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking network round trip. Implementations must give up after `timeout`.
pub trait Transport {
    fn post_json(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("svg-llm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GenerateError::Configuration(format!("HTTP client setup failed: {err}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn post_json(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse> {
        let mut builder = self.client.post(&request.url).timeout(timeout).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().map_err(|err| transport_error(err, timeout))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| transport_error(err, timeout))?;
        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        })
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> GenerateError {
    if err.is_timeout() {
        return GenerateError::Transport(format!(
            "request timed out after {}s",
            timeout.as_secs_f32()
        ));
    }
    if err.is_connect() {
        return GenerateError::Transport("could not connect to the provider".to_string());
    }
    // Drop the URL: the Gemini key travels as a query parameter.
    GenerateError::Transport(err.without_url().to_string())
}

/// Turn a non-2xx response into an `HttpStatus` error, preferring the provider's own message.
pub fn status_error<A: ProviderAdapter + ?Sized>(adapter: &A, response: &HttpResponse) -> GenerateError {
    let message = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|body| adapter.error_message(&body))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("{} {}", response.status, response.reason));
    GenerateError::HttpStatus {
        status: response.status,
        message,
    }
}

pub struct RequestExecutor<'a> {
    transport: &'a dyn Transport,
    adapter: &'a dyn ProviderAdapter,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(transport: &'a dyn Transport, adapter: &'a dyn ProviderAdapter) -> Self {
        Self { transport, adapter }
    }

    /// Send `prompt`, retrying immediately up to `retries` more times.
    /// The error of the final attempt is returned unchanged.
    pub fn execute(
        &self,
        prompt: &str,
        config: &ProviderConfig,
        retries: u32,
        timeout: Duration,
    ) -> Result<String> {
        let attempts = retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            debug!(
                provider = self.adapter.kind().id(),
                attempt,
                attempts,
                "sending generation request"
            );
            match self.adapter.send(self.transport, prompt, config, timeout) {
                Ok(text) => return Ok(text),
                Err(err) if attempt < attempts => {
                    warn!(
                        provider = self.adapter.kind().id(),
                        attempt,
                        transient = err.is_attempt_failure(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
