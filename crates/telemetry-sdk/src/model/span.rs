// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::attributes::{self, AttributeValue, Attributes};
use crate::error::TelemetryError;

/// A single distributed-trace span.
///
/// Spans are only obtainable through [`SpanBuilder::build`], which validates them.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    id: String,
    trace_id: Option<String>,
    timestamp: i64,
    duration_ms: Option<f64>,
    name: Option<String>,
    parent_id: Option<String>,
    service_name: Option<String>,
    error: bool,
    attributes: Attributes,
}

impl Span {
    #[must_use]
    pub fn builder(id: impl Into<String>) -> SpanBuilder {
        SpanBuilder::new(id)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Start of the span in epoch milliseconds, `0` when unset.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration_ms
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// Builder producing validated [`Span`] values.
#[derive(Debug, Clone)]
#[must_use]
pub struct SpanBuilder {
    span: Span,
    // Reported by `build`, set by setters that cannot fail on their own
    invalid: Option<String>,
}

impl SpanBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        SpanBuilder {
            span: Span {
                id: id.into(),
                trace_id: None,
                timestamp: 0,
                duration_ms: None,
                name: None,
                parent_id: None,
                service_name: None,
                error: false,
                attributes: Attributes::new(),
            },
            invalid: None,
        }
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.span.trace_id = Some(trace_id.into());
        self
    }

    /// Start of the span in epoch milliseconds.
    ///
    /// Leaving it unset (or `0`) omits the field from the payload and the ingest API uses the time
    /// it received the span instead.
    pub fn timestamp(mut self, epoch_ms: i64) -> Self {
        self.span.timestamp = epoch_ms;
        self
    }

    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.span.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the timestamp and duration from a start and an end time in epoch milliseconds.
    pub fn execution_time(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.span.timestamp = start_ms;
        match end_ms.checked_sub(start_ms) {
            Some(duration) => {
                #[allow(clippy::cast_precision_loss)]
                let duration = duration as f64;
                self.span.duration_ms = Some(duration);
            }
            None => {
                self.invalid = Some(format!(
                    "span execution time from {start_ms} to {end_ms} overflows"
                ));
            }
        }
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.span.name = Some(name.into());
        self
    }

    pub fn parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.span.parent_id = Some(parent_id.into());
        self
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.span.service_name = Some(service_name.into());
        self
    }

    pub fn has_error(mut self, error: bool) -> Self {
        self.span.error = error;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.span.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.span.attributes.extend(
            attributes
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        self
    }

    pub fn build(self) -> Result<Span, TelemetryError> {
        if let Some(reason) = self.invalid {
            return Err(TelemetryError::InvalidRecord(reason));
        }
        if self.span.id.trim().is_empty() {
            return Err(TelemetryError::InvalidRecord(
                "span id must not be empty".to_string(),
            ));
        }
        if let Some(duration) = self.span.duration_ms {
            if !duration.is_finite() || duration < 0.0 {
                return Err(TelemetryError::InvalidRecord(format!(
                    "span {} has an invalid duration: {duration}",
                    self.span.id
                )));
            }
        }
        attributes::validate(&self.span.attributes, &format!("span {}", self.span.id))?;
        Ok(self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_minimal_span() {
        let span = Span::builder("span-1").build().expect("valid span");
        assert_eq!(span.id(), "span-1");
        assert_eq!(span.trace_id(), None);
        assert_eq!(span.timestamp(), 0);
        assert!(!span.has_error());
        assert!(span.attributes().is_empty());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        assert!(matches!(
            Span::builder("").build(),
            Err(TelemetryError::InvalidRecord(_))
        ));
        assert!(matches!(
            Span::builder("  ").build(),
            Err(TelemetryError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_execution_time() {
        let span = Span::builder("span-1")
            .execution_time(1_000, 1_250)
            .build()
            .expect("valid span");
        assert_eq!(span.timestamp(), 1_000);
        assert_eq!(span.duration_ms(), Some(250.0));
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let result = Span::builder("span-1").execution_time(2_000, 1_000).build();
        assert!(matches!(result, Err(TelemetryError::InvalidRecord(_))));
    }

    #[test]
    fn test_execution_time_overflow_is_rejected() {
        let result = Span::builder("span-1")
            .execution_time(i64::MIN, i64::MAX)
            .build();
        assert!(matches!(result, Err(TelemetryError::InvalidRecord(_))));

        let result = Span::builder("span-1").execution_time(i64::MAX, i64::MIN).build();
        assert!(matches!(result, Err(TelemetryError::InvalidRecord(_))));
    }

    #[test]
    fn test_non_finite_attribute_is_rejected() {
        let result = Span::builder("span-1").attribute("ratio", f64::NAN).build();
        assert!(matches!(result, Err(TelemetryError::InvalidRecord(_))));

        let result = Span::builder("span-1")
            .attributes([("load", f64::INFINITY)])
            .build();
        assert!(matches!(result, Err(TelemetryError::InvalidRecord(_))));
    }

    #[test]
    fn test_attributes_accumulate() {
        let span = Span::builder("span-1")
            .attribute("http.method", "GET")
            .attributes([("retries", 2), ("port", 8080)])
            .build()
            .expect("valid span");
        assert_eq!(span.attributes().len(), 3);
        assert_eq!(
            span.attributes().get("retries"),
            Some(&AttributeValue::Int(2))
        );
    }
}
