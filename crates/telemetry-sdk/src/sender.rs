// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reliable delivery of batches to the ingest API.
//!
//! # Architecture
//!
//! ```text
//!   send_batch(batch)
//!          │
//!          v
//!   ┌─────────────┐   empty
//!   │   Empty?    │ ─────────> DidNotSend
//!   └──────┬──────┘
//!          v
//!   ┌─────────────┐
//!   │  Marshall   │ (JSON)
//!   └──────┬──────┘
//!          v
//!   ┌─────────────┐   error / 4xx / other
//!   │ HTTP POST   │ ─────────────────────> Failure
//!   └──────┬──────┘
//!          │ 408 / 429            413
//!          v                       v
//!   ┌─────────────┐         ┌─────────────┐
//!   │ Delay, then │         │ Split, send │ (both halves concurrently)
//!   │ same batch  │         │ each half   │
//!   └─────────────┘         └─────────────┘
//! ```
//!
//! # Retry policy
//!
//! - **408**: capped exponential backoff, `min(max, factor * 2^(n-1))` seconds before retry `n`
//! - **429**: the server's `Retry-After`, or the backoff delay when there is none
//! - Both stop once `max_retry_attempts` retries have been made
//! - **413**: halve the batch and deliver both halves, down to single records
//! - Transport errors and every other status are terminal: the data is dropped

use crate::backoff::{retry_after, BackoffConfig};
use crate::config::TelemetryConfiguration;
use crate::error::TelemetryError;
use crate::http::{HttpClient, Transport};
use crate::model::{Batch, Metric, Record, Span};
use crate::serializer;
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use reqwest::StatusCode;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Asynchronous delay used between retries.
pub type DelayFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wraps an async function into a [`DelayFn`].
pub fn delay_fn<F, Fut>(f: F) -> DelayFn
where
    F: Fn(Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(
        move |delay: Duration| -> Pin<Box<dyn Future<Output = ()> + Send>> { Box::pin(f(delay)) },
    )
}

/// Types that can be sent to an ingest API.
///
/// The ingest APIs reject payloads that are too large with a 413. In that case the payload has to
/// be split and sent again, which is why a sendable must know how to halve itself.
pub trait Sendable: Sized + Send + 'static {
    /// Prefix used in log lines about this kind of data.
    const KIND: &'static str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates the JSON payload.
    fn marshall(&self) -> Result<Vec<u8>, serde_json::Error>;

    /// Splits into two halves, or `None` when there are fewer than two records.
    fn split(self) -> Option<(Self, Self)>;

    fn endpoint_url(config: &TelemetryConfiguration) -> &str;

    /// Applies configuration-level defaults before the first attempt.
    #[must_use]
    fn prepare(self, _config: &TelemetryConfiguration) -> Self {
        self
    }
}

impl<R: Record> Sendable for Batch<R> {
    const KIND: &'static str = R::KIND;

    fn len(&self) -> usize {
        Batch::len(self)
    }

    fn marshall(&self) -> Result<Vec<u8>, serde_json::Error> {
        serializer::marshall(self)
    }

    fn split(self) -> Option<(Self, Self)> {
        Batch::split(self)
    }

    fn endpoint_url(config: &TelemetryConfiguration) -> &str {
        R::endpoint_url(config)
    }

    fn prepare(self, config: &TelemetryConfiguration) -> Self {
        match config.service_name.as_deref().map(str::trim) {
            Some(service_name) if !service_name.is_empty() => self.with_service_name(service_name),
            _ => self,
        }
    }
}

/// Result of [`DataSender::send_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The batch had no records; nothing was sent.
    DidNotSend,
    Success,
    Failure {
        status: Option<StatusCode>,
        message: String,
    },
}

impl Response {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success)
    }

    fn failure(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        Response::Failure {
            status,
            message: message.into(),
        }
    }
}

/// How the sender reacts to a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 400, 401, 403, 404, 405, 411: the request will never be accepted
    ClientError,
    /// 408: retried with backoff
    RequestTimeout,
    /// 429: retried after the server-provided delay
    TooManyRequests,
    /// 413: retried by splitting the batch
    PayloadTooLarge,
    /// Anything else, terminal
    Unexpected,
}

#[must_use]
pub fn classify(status: StatusCode) -> StatusClass {
    if status.is_success() {
        return StatusClass::Success;
    }
    match status.as_u16() {
        400 | 401 | 403 | 404 | 405 | 411 => StatusClass::ClientError,
        408 => StatusClass::RequestTimeout,
        413 => StatusClass::PayloadTooLarge,
        429 => StatusClass::TooManyRequests,
        _ => StatusClass::Unexpected,
    }
}

/// Delivery engine for one kind of batch.
pub struct DataSender<B: Sendable> {
    config: Arc<TelemetryConfiguration>,
    backoff: BackoffConfig,
    transport: Arc<dyn Transport>,
    delay: DelayFn,
    _batch: PhantomData<fn(B)>,
}

pub type SpanDataSender = DataSender<Batch<Span>>;
pub type MetricDataSender = DataSender<Batch<Metric>>;

impl<B: Sendable> DataSender<B> {
    /// Creates a sender posting to the endpoint configured for `B`.
    pub fn new(config: Arc<TelemetryConfiguration>) -> Result<Self, TelemetryError> {
        config.validate()?;
        let transport = HttpClient::new(B::endpoint_url(&config), &config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a sender using a caller-provided transport.
    pub fn with_transport(
        config: Arc<TelemetryConfiguration>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, TelemetryError> {
        config.validate()?;
        Ok(DataSender {
            backoff: BackoffConfig::from_config(&config),
            config,
            transport,
            delay: delay_fn(tokio::time::sleep),
            _batch: PhantomData,
        })
    }

    /// Replaces the delay used between retries.
    #[must_use]
    pub fn with_delay_fn(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    /// Appends `product/version` to the `User-Agent` header. No-op if either is empty.
    pub fn add_version_info(&self, product: &str, version: &str) {
        self.transport.add_version_info(product, version);
    }

    #[must_use]
    pub fn config(&self) -> &TelemetryConfiguration {
        &self.config
    }

    /// Delivers a batch, retrying and splitting as needed.
    ///
    /// Delivery failures are reported as [`Response::Failure`]; an `Err` is only returned when the
    /// batch cannot be serialized.
    pub async fn send_batch(&self, batch: B) -> Result<Response, TelemetryError> {
        let batch = batch.prepare(&self.config);
        self.send_with_retry(batch, 0).await
    }

    fn send_with_retry(
        &self,
        batch: B,
        retry_num: u32,
    ) -> BoxFuture<'_, Result<Response, TelemetryError>> {
        Box::pin(async move {
            if batch.is_empty() {
                debug!("{} | Batch is empty, nothing to send", B::KIND);
                return Ok(Response::DidNotSend);
            }

            let n_records = batch.len();
            let payload = batch.marshall()?;
            if self.config.audit_logging_enabled {
                debug!(
                    "{} | Sending payload: {}",
                    B::KIND,
                    String::from_utf8_lossy(&payload)
                );
            }

            let time = Instant::now();
            let response = match self.transport.send(payload).await {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        "{} | Failed to send {} records after {} ms: {}",
                        B::KIND,
                        n_records,
                        time.elapsed().as_millis(),
                        e
                    );
                    return Ok(Response::failure(None, e.to_string()));
                }
            };
            let status = response.status;

            match classify(status) {
                StatusClass::Success => {
                    debug!(
                        "{} | Successfully sent {} records in {} ms",
                        B::KIND,
                        n_records,
                        time.elapsed().as_millis()
                    );
                    Ok(Response::Success)
                }
                StatusClass::ClientError => {
                    error!(
                        "{} | Request rejected with {}, {} records dropped: {}",
                        B::KIND,
                        status,
                        n_records,
                        response.body
                    );
                    Ok(Response::failure(
                        Some(status),
                        format!("Request rejected with {status}"),
                    ))
                }
                StatusClass::Unexpected => {
                    error!(
                        "{} | Unexpected response {}, {} records dropped: {}",
                        B::KIND,
                        status,
                        n_records,
                        response.body
                    );
                    Ok(Response::failure(Some(status), response.body))
                }
                StatusClass::RequestTimeout => {
                    self.retry_with_delay(batch, retry_num, status, None).await
                }
                StatusClass::TooManyRequests => {
                    let server_delay = retry_after(&response.headers, Utc::now());
                    self.retry_with_delay(batch, retry_num, status, server_delay)
                        .await
                }
                StatusClass::PayloadTooLarge => self.retry_with_split(batch).await,
            }
        })
    }

    async fn retry_with_delay(
        &self,
        batch: B,
        retry_num: u32,
        status: StatusCode,
        server_delay: Option<Duration>,
    ) -> Result<Response, TelemetryError> {
        let retry_num = retry_num.saturating_add(1);
        let max_retries = self.config.max_retry_attempts;
        if retry_num > max_retries {
            error!(
                "{} | Received {} on every attempt, {} records dropped after {} attempts",
                B::KIND,
                status,
                batch.len(),
                retry_num
            );
            return Ok(Response::failure(
                Some(status),
                format!("Send {} failed after {} attempts", B::KIND, retry_num),
            ));
        }

        let delay = server_delay.unwrap_or_else(|| self.backoff.delay_for(retry_num));
        warn!(
            "{} | Received {}, retrying in {:?} (retry {} of {})",
            B::KIND,
            status,
            delay,
            retry_num,
            max_retries
        );
        (self.delay)(delay).await;
        self.send_with_retry(batch, retry_num).await
    }

    async fn retry_with_split(&self, batch: B) -> Result<Response, TelemetryError> {
        let n_records = batch.len();
        let Some((first, second)) = batch.split() else {
            error!(
                "{} | Payload too large and cannot be split, {} records dropped",
                B::KIND,
                n_records
            );
            return Ok(Response::failure(
                Some(StatusCode::PAYLOAD_TOO_LARGE),
                format!("Payload of {n_records} records is too large and cannot be split"),
            ));
        };

        warn!(
            "{} | Payload too large, splitting {} records into batches of {} and {}",
            B::KIND,
            n_records,
            first.len(),
            second.len()
        );

        let results = join_all([
            self.send_with_retry(first, 0),
            self.send_with_retry(second, 0),
        ])
        .await;

        let total = results.len();
        let mut failed = 0;
        for result in results {
            if !result?.is_success() {
                failed += 1;
            }
        }

        if failed == 0 {
            Ok(Response::Success)
        } else {
            Ok(Response::failure(
                None,
                format!("{failed} of {total} sub-batches failed"),
            ))
        }
    }
}
