// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport for ingest payloads.
//!
//! A [`Transport`] performs exactly one submission of an already serialized payload and hands the
//! raw outcome back. Interpreting status codes and retrying is the sender's job.
//!
//! [`HttpClient`] is the production transport:
//! - gzip-compresses the JSON payload
//! - sets `Api-Key`, `Content-Type`, `Content-Encoding` and `User-Agent`
//! - applies the configured send timeout to every request
//! - reuses one pooled `reqwest::Client`, optionally through an HTTPS proxy

use crate::config::TelemetryConfiguration;
use crate::error::{TelemetryError, TransportError};
use async_trait::async_trait;
use core::time::Duration;
use flate2::{write::GzEncoder, Compression};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use std::io::Write;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Fixed part of the `User-Agent` header.
pub const SDK_USER_AGENT: &str = concat!("TelemetrySdk-Rust/", env!("CARGO_PKG_VERSION"));

const API_KEY_HEADER: &str = "Api-Key";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Raw outcome of a submission that reached the server.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Response body, only read for non-2xx responses.
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        TransportResponse {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Submits one serialized (uncompressed) payload.
    async fn send(&self, payload: Vec<u8>) -> Result<TransportResponse, TransportError>;

    /// Registers a `product/version` pair appended to the `User-Agent` header.
    fn add_version_info(&self, _product: &str, _version: &str) {}
}

#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    url: String,
    api_key: HeaderValue,
    timeout: Duration,
    product_version: OnceLock<String>,
}

impl HttpClient {
    pub fn new(url: impl Into<String>, config: &TelemetryConfiguration) -> Result<Self, TelemetryError> {
        let api_key = config
            .api_key()
            .ok_or_else(|| TelemetryError::InvalidConfig("an API key is required".to_string()))?;
        let mut api_key = HeaderValue::from_str(api_key).map_err(|_| {
            TelemetryError::InvalidConfig("the API key is not a valid header value".to_string())
        })?;
        api_key.set_sensitive(true);

        Ok(HttpClient {
            client: get_client(config),
            url: url.into(),
            api_key,
            timeout: config.send_timeout(),
            product_version: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn user_agent(&self) -> String {
        match self.product_version.get() {
            Some(product_version) => format!("{SDK_USER_AGENT} {product_version}"),
            None => SDK_USER_AGENT.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, self.api_key.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent())
                .map_err(|_| TransportError::InvalidHeader("User-Agent"))?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, payload: Vec<u8>) -> Result<TransportResponse, TransportError> {
        let body = compress(&payload)?;
        let headers = self.headers()?;

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        // Don't read response body unless needed
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }

    fn add_version_info(&self, product: &str, version: &str) {
        if product.trim().is_empty() || version.trim().is_empty() {
            return;
        }
        let product_version = format!("{}/{}", product.trim(), version.trim());
        if HeaderValue::from_str(&product_version).is_err() {
            debug!("Ignoring version info {product_version:?}: not a valid header value");
            return;
        }
        if self.product_version.set(product_version).is_err() {
            debug!("Version info already registered, ignoring {product}/{version}");
        }
    }
}

/// Creates the pooled HTTP client, falling back to a direct connection when the proxy
/// configuration is unusable.
#[must_use]
pub fn get_client(config: &TelemetryConfiguration) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(
    config: &TelemetryConfiguration,
    allow_proxy: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut client = reqwest::Client::builder()
        .timeout(config.send_timeout())
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            client = client.proxy(reqwest::Proxy::https(https_uri.as_str())?);
        }
    }

    client.build()
}

pub(crate) fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
