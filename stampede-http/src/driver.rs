//! Request driver trait and the reqwest-backed implementation

use crate::client::build_client;
use crate::errors::HttpError;
use crate::request::{to_reqwest_method, PreparedRequest};
use chrono::Utc;
use reqwest::Client;
use stampede_config::HttpConfig;
use stampede_core::{LoadTestConfig, LoadTestResult};
use std::time::Instant;
use tracing::debug;

/// Issues one timed request per call on behalf of a virtual user
#[async_trait::async_trait]
pub trait RequestDriver: Send + Sync {
    /// Build the request template for a run. Called once, before any user starts.
    fn prepare(&self, config: &LoadTestConfig) -> Result<PreparedRequest, HttpError> {
        PreparedRequest::from_config(config)
    }

    /// Issue the request and describe the outcome. Never fails: transport
    /// errors are carried on the returned result.
    async fn execute(&self, request: &PreparedRequest, user_id: usize) -> LoadTestResult;
}

/// Driver backed by a shared, pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl RequestDriver for HttpDriver {
    async fn execute(&self, request: &PreparedRequest, user_id: usize) -> LoadTestResult {
        let start_time = Utc::now();
        let started = Instant::now();

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let mut response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(user_id, error = %e, "Request failed");
                return LoadTestResult::failure(
                    user_id,
                    start_time,
                    started.elapsed(),
                    None,
                    describe_error(&e),
                );
            }
        };

        let status = response.status().as_u16();

        // Count body bytes without buffering the whole payload
        let mut response_size = 0u64;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => response_size += chunk.len() as u64,
                Ok(None) => break,
                Err(e) => {
                    debug!(user_id, status, error = %e, "Failed to read response body");
                    return LoadTestResult::failure(
                        user_id,
                        start_time,
                        started.elapsed(),
                        Some(status),
                        format!("failed to read response body: {}", e),
                    );
                }
            }
        }

        LoadTestResult::response(user_id, start_time, started.elapsed(), status, response_size)
    }
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
