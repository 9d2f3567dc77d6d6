//! HTTP Transport Adapter
//!
//! Implements the `Transport` port with a pooled reqwest client. Each
//! request POSTs the JSON payload to `http://<host>:<port><path>`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::domain::{Transport, TransportFailure};
use crate::error::{Error, Result};
use crate::registry::Target;

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,

    /// Idle connections kept per target host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("e2sim/{}", env!("CARGO_PKG_VERSION")),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 2,
        }
    }
}

/// reqwest-backed transport. Connections are pooled per target host.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(HttpTransportConfig::default())
    }

    pub fn with_config(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        target: &Target,
        payload: Bytes,
    ) -> std::result::Result<u16, TransportFailure> {
        let url = target.url();
        debug!(target_name = %target.name(), url = %url, bytes = payload.len(), "Posting indication");

        let response = self
            .client
            .post(&url)
            .timeout(target.timeout())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(classify)?;

        Ok(response.status().as_u16())
    }
}

/// Map a reqwest error onto the delivery taxonomy.
fn classify(error: reqwest::Error) -> TransportFailure {
    let message = error_chain(&error);
    if error.is_timeout() {
        TransportFailure::timeout(message)
    } else if error.is_connect() {
        TransportFailure::connection(message)
    } else {
        TransportFailure::other(message)
    }
}

/// Render an error with its full source chain.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
