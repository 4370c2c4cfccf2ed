//! HTTP transport with per-method retry policy.
//!
//! A [`Transport`] turns one logical call into one or more HTTP attempts and
//! reports the final response or transport failure together with the number
//! of attempts made. HTTP statuses are returned as-is; deciding what a status
//! means is the caller's business.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProvisionConfig;
use crate::errors::{compute_backoff, Method, RetryPolicy, TransportError};

/// Downstream service a call is addressed to. Selects authentication headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Registry,
    Connector,
    Content,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub service: Service,
}

impl Request {
    #[must_use]
    pub fn get(service: Service, url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            service,
        }
    }

    #[must_use]
    pub fn post(service: Service, url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
            service,
        }
    }

    #[must_use]
    pub fn delete(service: Service, url: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            url: url.into(),
            body: None,
            service,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body parsed as JSON, `None` when empty or malformed.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Final state of one logical call.
#[derive(Debug)]
pub struct Exchange {
    pub result: Result<Response, TransportError>,
    pub attempts: u32,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Exchange;
}

/// `reqwest`-backed transport shared by all tasks of a run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
    api_key_header: String,
    api_key: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Build a transport from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &ProvisionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.resources.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            retry: RetryPolicy::new(
                config.resources.max_retries,
                config.resources.backoff_base_ms,
                config.resources.backoff_max_ms,
            ),
            api_key_header: config.connector.api_key_header.clone(),
            api_key: config.connector.api_key.clone(),
            bearer_token: config.registry.bearer_token.clone(),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        match request.service {
            Service::Connector => {
                builder = builder.header(self.api_key_header.as_str(), self.api_key.as_str());
            }
            Service::Registry => {
                if let Some(ref token) = self.bearer_token {
                    builder = builder.bearer_auth(token);
                }
            }
            Service::Content => {}
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Response { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Exchange {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(request).await {
                Ok(response) => {
                    tracing::debug!(
                        method = %request.method,
                        url = request.url.as_str(),
                        status = response.status,
                        attempt,
                        "HTTP call completed"
                    );
                    return Exchange {
                        result: Ok(response),
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    let retries_left = attempt <= self.retry.max_retries;
                    if !retries_left || !err.is_retryable_for(request.method) {
                        tracing::warn!(
                            method = %request.method,
                            url = request.url.as_str(),
                            attempt,
                            error = %err,
                            "HTTP call failed"
                        );
                        return Exchange {
                            result: Err(err),
                            attempts: attempt,
                        };
                    }
                    let delay = compute_backoff(&self.retry, attempt);
                    tracing::info!(
                        method = %request.method,
                        url = request.url.as_str(),
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying HTTP call"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
