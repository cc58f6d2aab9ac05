// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Telemetry SDK
//!
//! Reliable delivery of span and metric batches to a telemetry ingest API.
//!
//! ## Overview
//!
//! Callers build immutable records, group them into a [`Batch`] with the properties they share,
//! and hand the batch to a [`DataSender`]. The sender serializes it to the JSON wire format,
//! gzip-compresses it, posts it, and reacts to the response:
//! - **2xx**: done
//! - **408 / 429**: retried after a capped exponential backoff or the server's `Retry-After`
//! - **413**: the batch is halved and both halves are delivered independently
//! - anything else: the data is dropped and a [`Response::Failure`] is returned
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetry_sdk::{Span, SpanBatch, SpanCommon, SpanDataSender, TelemetryConfiguration};
//!
//! # async fn run() -> Result<(), telemetry_sdk::TelemetryError> {
//! let config = Arc::new(TelemetryConfiguration::with_api_key("my-api-key"));
//! let sender = SpanDataSender::new(config)?;
//!
//! let span = Span::builder("span-1").name("GET /users").duration_ms(12.5).build()?;
//! let batch = SpanBatch::with_common(SpanCommon::new().trace_id("trace-1"), vec![span]);
//! if !sender.send_batch(batch).await?.is_success() {
//!     // the batch was dropped, see the logs for details
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(clippy::missing_errors_doc)]

/// Retry delays: exponential backoff and `Retry-After`
pub mod backoff;

/// Sender configuration and its defaults
pub mod config;

pub mod error;

/// HTTP transport: compression, headers, proxy support
pub mod http;

/// Log line formatting and subscriber setup
pub mod logger;

/// Spans, metrics and batches
pub mod model;

/// Delivery engine: retries, backoff and batch splitting
pub mod sender;

/// JSON wire format
pub mod serializer;

pub use config::TelemetryConfiguration;
pub use error::{TelemetryError, TransportError};
pub use http::{HttpClient, Transport, TransportResponse};
pub use model::{
    AttributeValue, Attributes, Batch, Metric, MetricBatch, MetricBuilder, MetricCommon,
    MetricType, MetricValue, Span, SpanBatch, SpanBuilder, SpanCommon, SummaryValue,
};
pub use sender::{
    DataSender, DelayFn, MetricDataSender, Response, Sendable, SpanDataSender, StatusClass,
};
