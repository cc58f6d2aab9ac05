// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::attributes::{AttributeValue, Attributes};
use super::metric::{self, Metric};
use super::span::Span;
use crate::config::TelemetryConfiguration;
use crate::error::TelemetryError;
use crate::serializer::{has_no_wire_attributes, is_unset_timestamp};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

pub(crate) const SERVICE_NAME_ATTRIBUTE: &str = "service.name";

/// Properties applied by the ingest API to every record of a batch.
pub trait CommonProperties: Serialize + Debug + Default + Send + Sync + 'static {
    /// `true` when nothing would be emitted in the `common` block.
    fn is_empty(&self) -> bool;

    /// Returns a copy carrying `service.name`, or `None` when no change is needed.
    fn with_service_name(&self, _service_name: &str) -> Option<Self> {
        None
    }
}

/// A kind of telemetry record the ingest API accepts in batches.
pub trait Record: Serialize + Debug + Send + Sync + 'static {
    type Common: CommonProperties;

    /// Prefix used in log lines about this kind of data.
    const KIND: &'static str;

    /// Key of the record array in the wire payload.
    const WIRE_KEY: &'static str;

    fn endpoint_url(config: &TelemetryConfiguration) -> &str;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpanCommon {
    #[serde(rename = "trace.id", skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Non-finite float values are left out of the payload.
    #[serde(
        skip_serializing_if = "has_no_wire_attributes",
        serialize_with = "crate::serializer::serialize_wire_attributes"
    )]
    pub attributes: Attributes,
}

impl SpanCommon {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl CommonProperties for SpanCommon {
    fn is_empty(&self) -> bool {
        self.trace_id.is_none() && has_no_wire_attributes(&self.attributes)
    }

    fn with_service_name(&self, service_name: &str) -> Option<Self> {
        if self.attributes.contains_key(SERVICE_NAME_ATTRIBUTE) {
            return None;
        }
        let mut common = self.clone();
        common
            .attributes
            .insert(SERVICE_NAME_ATTRIBUTE.to_string(), service_name.into());
        Some(common)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricCommon {
    #[serde(skip_serializing_if = "is_unset_timestamp")]
    timestamp: i64,
    #[serde(rename = "interval.ms", skip_serializing_if = "Option::is_none")]
    interval_ms: Option<i64>,
    /// Non-finite float values are left out of the payload.
    #[serde(
        skip_serializing_if = "has_no_wire_attributes",
        serialize_with = "crate::serializer::serialize_wire_attributes"
    )]
    pub attributes: Attributes,
}

impl MetricCommon {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch milliseconds, `0` when unset.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn interval_ms(&self) -> Option<i64> {
        self.interval_ms
    }

    /// Sets the common timestamp, in epoch milliseconds. `0` leaves it unset.
    #[must_use]
    pub fn with_timestamp(mut self, epoch_ms: i64) -> Self {
        self.timestamp = epoch_ms;
        self
    }

    /// Sets the common timestamp and interval from a start and an end time in epoch milliseconds.
    ///
    /// Fails when the end precedes the start or the interval does not fit in an `i64`.
    pub fn interval(mut self, start_ms: i64, end_ms: i64) -> Result<Self, TelemetryError> {
        let interval_ms = metric::interval_between(start_ms, end_ms)
            .map_err(|reason| TelemetryError::InvalidRecord(format!("common block: {reason}")))?;
        self.timestamp = start_ms;
        self.interval_ms = Some(interval_ms);
        Ok(self)
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl CommonProperties for MetricCommon {
    fn is_empty(&self) -> bool {
        is_unset_timestamp(&self.timestamp)
            && self.interval_ms.is_none()
            && has_no_wire_attributes(&self.attributes)
    }
}

impl Record for Span {
    type Common = SpanCommon;
    const KIND: &'static str = "SPANS";
    const WIRE_KEY: &'static str = "spans";

    fn endpoint_url(config: &TelemetryConfiguration) -> &str {
        &config.trace_url
    }
}

impl Record for Metric {
    type Common = MetricCommon;
    const KIND: &'static str = "METRICS";
    const WIRE_KEY: &'static str = "metrics";

    fn endpoint_url(config: &TelemetryConfiguration) -> &str {
        &config.metric_url
    }
}

/// Ordered records plus the properties they share.
///
/// The common properties sit behind an `Arc` so that halves produced by [`Batch::split`] point at
/// the same value as their parent.
#[derive(Debug, Clone)]
pub struct Batch<R: Record> {
    common: Arc<R::Common>,
    records: Vec<R>,
}

pub type SpanBatch = Batch<Span>;
pub type MetricBatch = Batch<Metric>;

impl<R: Record> Batch<R> {
    #[must_use]
    pub fn new(records: Vec<R>) -> Self {
        Self::with_common(R::Common::default(), records)
    }

    #[must_use]
    pub fn with_common(common: R::Common, records: Vec<R>) -> Self {
        Self::with_shared_common(Arc::new(common), records)
    }

    #[must_use]
    pub fn with_shared_common(common: Arc<R::Common>, records: Vec<R>) -> Self {
        Batch { common, records }
    }

    #[must_use]
    pub fn common(&self) -> &Arc<R::Common> {
        &self.common
    }

    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Splits the records at the midpoint; the first half gets the smaller share on odd counts.
    ///
    /// Returns `None` for batches of fewer than two records.
    #[must_use]
    pub fn split(mut self) -> Option<(Self, Self)> {
        if self.records.len() < 2 {
            return None;
        }
        let second = self.records.split_off(self.records.len() / 2);
        let second = Batch::with_shared_common(Arc::clone(&self.common), second);
        Some((self, second))
    }

    /// Applies a default `service.name` without touching the caller's common properties.
    #[must_use]
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        if let Some(common) = self.common.with_service_name(service_name) {
            self.common = Arc::new(common);
        }
        self
    }
}
