// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::attributes::{self, AttributeValue, Attributes};
use crate::error::TelemetryError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Count,
    Gauge,
    Summary,
}

/// Aggregated observations of a summary metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryValue {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Summary(SummaryValue),
}

impl MetricValue {
    fn is_finite(&self) -> bool {
        match self {
            MetricValue::Int(_) => true,
            MetricValue::Float(value) => value.is_finite(),
            MetricValue::Summary(summary) => {
                summary.sum.is_finite() && summary.min.is_finite() && summary.max.is_finite()
            }
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<SummaryValue> for MetricValue {
    fn from(value: SummaryValue) -> Self {
        MetricValue::Summary(value)
    }
}

/// A single metric data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    name: String,
    #[serde(rename = "type")]
    metric_type: MetricType,
    value: MetricValue,
    #[serde(skip_serializing_if = "crate::serializer::is_unset_timestamp")]
    timestamp: i64,
    #[serde(rename = "interval.ms", skip_serializing_if = "Option::is_none")]
    interval_ms: Option<i64>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    attributes: Attributes,
}

impl Metric {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    #[must_use]
    pub fn value(&self) -> &MetricValue {
        &self.value
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

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// Length of the interval from `start_ms` to `end_ms`.
pub(crate) fn interval_between(start_ms: i64, end_ms: i64) -> Result<i64, String> {
    match end_ms.checked_sub(start_ms) {
        Some(interval) if interval >= 0 => Ok(interval),
        Some(interval) => Err(format!("negative interval {interval} ms")),
        None => Err(format!("interval from {start_ms} to {end_ms} overflows")),
    }
}

/// Builder producing validated [`Metric`] values.
#[derive(Debug, Clone)]
#[must_use]
pub struct MetricBuilder {
    metric: Metric,
    invalid: Option<String>,
}

impl MetricBuilder {
    fn new(name: impl Into<String>, metric_type: MetricType, value: MetricValue) -> Self {
        MetricBuilder {
            metric: Metric {
                name: name.into(),
                metric_type,
                value,
                timestamp: 0,
                interval_ms: None,
                attributes: Attributes::new(),
            },
            invalid: None,
        }
    }

    pub fn count(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self::new(name, MetricType::Count, value.into())
    }

    pub fn gauge(name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self::new(name, MetricType::Gauge, value.into())
    }

    pub fn summary(name: impl Into<String>, value: SummaryValue) -> Self {
        Self::new(name, MetricType::Summary, MetricValue::Summary(value))
    }

    pub fn timestamp(mut self, epoch_ms: i64) -> Self {
        self.metric.timestamp = epoch_ms;
        self
    }

    pub fn interval_ms(mut self, interval_ms: i64) -> Self {
        self.metric.interval_ms = Some(interval_ms);
        self
    }

    /// Sets the timestamp and interval from a start and an end time in epoch milliseconds.
    pub fn interval(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.metric.timestamp = start_ms;
        match interval_between(start_ms, end_ms) {
            Ok(interval_ms) => self.metric.interval_ms = Some(interval_ms),
            Err(reason) => self.invalid = Some(reason),
        }
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.metric.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.metric.attributes.extend(
            attributes
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    pub fn build(self) -> Result<Metric, TelemetryError> {
        let metric = self.metric;
        if metric.name.trim().is_empty() {
            return Err(TelemetryError::InvalidRecord(
                "metric name must not be empty".to_string(),
            ));
        }
        if let Some(reason) = self.invalid {
            return Err(TelemetryError::InvalidRecord(format!(
                "metric {}: {reason}",
                metric.name
            )));
        }
        let summary_value = matches!(metric.value, MetricValue::Summary(_));
        if summary_value != (metric.metric_type == MetricType::Summary) {
            return Err(TelemetryError::InvalidRecord(format!(
                "metric {} has a value that does not match its type {:?}",
                metric.name, metric.metric_type
            )));
        }
        if !metric.value.is_finite() {
            return Err(TelemetryError::InvalidRecord(format!(
                "metric {} has a non-finite value",
                metric.name
            )));
        }
        if metric.interval_ms.is_some_and(|interval| interval < 0) {
            return Err(TelemetryError::InvalidRecord(format!(
                "metric {} has a negative interval",
                metric.name
            )));
        }
        attributes::validate(&metric.attributes, &format!("metric {}", metric.name))?;
        Ok(metric)
    }
}
