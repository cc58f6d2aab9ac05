// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON wire format of span and metric batches.
//!
//! A payload is a single-element array:
//!
//! ```text
//! [{"common": {...}, "spans": [{...}, ...]}]
//! ```
//!
//! Absent values are left out entirely rather than written as `null`: unset options, a zero
//! timestamp, empty attribute maps and a `false` error flag never reach the wire. The ingest API
//! validates payloads strictly, so the output of this module is checked byte for byte in tests.

use crate::model::{AttributeValue, Attributes, Batch, CommonProperties, Record, Span};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

const DURATION_MS: &str = "duration.ms";
const NAME: &str = "name";
const PARENT_ID: &str = "parent.id";
const SERVICE_NAME: &str = "service.name";
const ERROR: &str = "error";

pub(crate) fn is_unset_timestamp(timestamp: &i64) -> bool {
    *timestamp == 0
}

pub(crate) fn has_no_wire_attributes(attributes: &Attributes) -> bool {
    !attributes.values().any(AttributeValue::is_finite)
}

// JSON has no NaN or infinity; such values would come out as `null`.
pub(crate) fn serialize_wire_attributes<S: Serializer>(
    attributes: &Attributes,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(attributes.iter().filter(|(_, value)| value.is_finite()))
}

/// Serializes a batch into its JSON payload.
pub fn marshall<R: Record>(batch: &Batch<R>) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&[Envelope(batch)])
}

struct Envelope<'a, R: Record>(&'a Batch<R>);

impl<R: Record> Serialize for Envelope<'_, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let batch = self.0;
        let mut map = serializer.serialize_map(None)?;
        if !batch.common().is_empty() {
            map.serialize_entry("common", batch.common().as_ref())?;
        }
        if !batch.is_empty() {
            map.serialize_entry(R::WIRE_KEY, batch.records())?;
        }
        map.end()
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let attributes = wire_attributes(self);
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", self.id())?;
        if let Some(trace_id) = self.trace_id() {
            map.serialize_entry("trace.id", trace_id)?;
        }
        if !is_unset_timestamp(&self.timestamp()) {
            map.serialize_entry("timestamp", &self.timestamp())?;
        }
        if !attributes.is_empty() {
            map.serialize_entry("attributes", &attributes)?;
        }
        map.end()
    }
}

// Well-known span fields travel as attributes and take precedence over custom ones.
fn wire_attributes(span: &Span) -> BTreeMap<&str, AttributeValue> {
    let mut attributes: BTreeMap<&str, AttributeValue> = span
        .attributes()
        .iter()
        .map(|(key, value)| (key.as_str(), value.clone()))
        .collect();

    if let Some(duration_ms) = span.duration_ms() {
        attributes.insert(DURATION_MS, AttributeValue::Float(duration_ms));
    }
    if let Some(name) = span.name() {
        attributes.insert(NAME, name.into());
    }
    if let Some(parent_id) = span.parent_id() {
        attributes.insert(PARENT_ID, parent_id.into());
    }
    if let Some(service_name) = span.service_name() {
        attributes.insert(SERVICE_NAME, service_name.into());
    }
    if span.has_error() {
        attributes.insert(ERROR, AttributeValue::Bool(true));
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        MetricBatch, MetricBuilder, MetricCommon, SpanBatch, SpanCommon, SummaryValue,
    };

    fn to_string<R: Record>(batch: &Batch<R>) -> String {
        String::from_utf8(marshall(batch).expect("serializable")).expect("utf-8 payload")
    }

    #[test]
    fn test_span_with_only_set_fields() {
        let span = Span::builder("span-1")
            .trace_id("trace-1")
            .timestamp(1_700_000_000_000)
            .duration_ms(12.5)
            .name("GET /users")
            .build()
            .unwrap();

        assert_eq!(
            to_string(&SpanBatch::new(vec![span])),
            r#"[{"spans":[{"id":"span-1","trace.id":"trace-1","timestamp":1700000000000,"attributes":{"duration.ms":12.5,"name":"GET /users"}}]}]"#
        );
    }

    #[test]
    fn test_span_with_id_only() {
        let span = Span::builder("span-1").build().unwrap();
        assert_eq!(
            to_string(&SpanBatch::new(vec![span])),
            r#"[{"spans":[{"id":"span-1"}]}]"#
        );
    }

    #[test]
    fn test_zero_timestamp_is_omitted() {
        let span = Span::builder("span-1").timestamp(0).name("op").build().unwrap();
        assert_eq!(
            to_string(&SpanBatch::new(vec![span])),
            r#"[{"spans":[{"id":"span-1","attributes":{"name":"op"}}]}]"#
        );
    }

    #[test]
    fn test_span_with_common_block_and_well_known_attributes() {
        let common = SpanCommon::new().trace_id("trace-1").attribute("host", "web-1");
        let span = Span::builder("span-2")
            .timestamp(5)
            .duration_ms(3.0)
            .name("real")
            .parent_id("span-1")
            .service_name("checkout")
            .has_error(true)
            .attribute("retries", 2)
            .attribute("name", "shadowed")
            .build()
            .unwrap();

        assert_eq!(
            to_string(&SpanBatch::with_common(common, vec![span])),
            r#"[{"common":{"trace.id":"trace-1","attributes":{"host":"web-1"}},"spans":[{"id":"span-2","timestamp":5,"attributes":{"duration.ms":3.0,"error":true,"name":"real","parent.id":"span-1","retries":2,"service.name":"checkout"}}]}]"#
        );
    }

    #[test]
    fn test_error_flag_false_is_omitted() {
        let span = Span::builder("span-1").has_error(false).build().unwrap();
        assert_eq!(
            to_string(&SpanBatch::new(vec![span])),
            r#"[{"spans":[{"id":"span-1"}]}]"#
        );
    }

    #[test]
    fn test_metric_batch() {
        let common = MetricCommon::new()
            .interval(1_000, 11_000)
            .expect("valid interval")
            .attribute("host", "web-1");
        let count = MetricBuilder::count("requests", 7_i64)
            .interval(1_000, 11_000)
            .attribute("code", 200)
            .build()
            .unwrap();
        let gauge = MetricBuilder::gauge("temperature", 21.5).build().unwrap();
        let summary = MetricBuilder::summary(
            "latency",
            SummaryValue {
                count: 4,
                sum: 10.0,
                min: 1.0,
                max: 4.5,
            },
        )
        .timestamp(2_000)
        .build()
        .unwrap();

        assert_eq!(
            to_string(&MetricBatch::with_common(common, vec![count, gauge, summary])),
            concat!(
                r#"[{"common":{"timestamp":1000,"interval.ms":10000,"attributes":{"host":"web-1"}},"metrics":["#,
                r#"{"name":"requests","type":"count","value":7,"timestamp":1000,"interval.ms":10000,"attributes":{"code":200}},"#,
                r#"{"name":"temperature","type":"gauge","value":21.5},"#,
                r#"{"name":"latency","type":"summary","value":{"count":4,"sum":10.0,"min":1.0,"max":4.5},"timestamp":2000}"#,
                r#"]}]"#
            )
        );
    }

    #[test]
    fn test_non_finite_common_attributes_are_left_out() {
        let common = SpanCommon::new()
            .attribute("load", f64::INFINITY)
            .attribute("host", "web-1");
        let span = Span::builder("span-1").build().unwrap();
        assert_eq!(
            to_string(&SpanBatch::with_common(common, vec![span.clone()])),
            r#"[{"common":{"attributes":{"host":"web-1"}},"spans":[{"id":"span-1"}]}]"#
        );

        let common = SpanCommon::new().attribute("load", f64::NAN);
        assert_eq!(
            to_string(&SpanBatch::with_common(common, vec![span])),
            r#"[{"spans":[{"id":"span-1"}]}]"#
        );

        let common = MetricCommon::new()
            .attribute("load", f64::NEG_INFINITY)
            .attribute("region", "eu");
        let gauge = MetricBuilder::gauge("temperature", 21.5).build().unwrap();
        assert_eq!(
            to_string(&MetricBatch::with_common(common, vec![gauge])),
            r#"[{"common":{"attributes":{"region":"eu"}},"metrics":[{"name":"temperature","type":"gauge","value":21.5}]}]"#
        );
    }

    #[test]
    fn test_zero_common_timestamp_is_omitted() {
        let common = MetricCommon::new().with_timestamp(0);
        let gauge = MetricBuilder::gauge("temperature", 21.5).build().unwrap();
        assert_eq!(
            to_string(&MetricBatch::with_common(common, vec![gauge.clone()])),
            r#"[{"metrics":[{"name":"temperature","type":"gauge","value":21.5}]}]"#
        );

        let common = MetricCommon::new().with_timestamp(1_000);
        assert_eq!(
            to_string(&MetricBatch::with_common(common, vec![gauge])),
            r#"[{"common":{"timestamp":1000},"metrics":[{"name":"temperature","type":"gauge","value":21.5}]}]"#
        );
    }

    #[test]
    fn test_empty_batch_serializes_to_empty_object() {
        assert_eq!(to_string(&SpanBatch::new(vec![])), "[{}]");
        assert_eq!(to_string(&MetricBatch::new(vec![])), "[{}]");
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let span = Span::builder("span-1")
            .attributes([("b", 1), ("a", 2), ("c", 3)])
            .build()
            .unwrap();
        let batch = SpanBatch::new(vec![span]);
        assert_eq!(marshall(&batch).unwrap(), marshall(&batch).unwrap());
        assert_eq!(
            to_string(&batch),
            r#"[{"spans":[{"id":"span-1","attributes":{"a":2,"b":1,"c":3}}]}]"#
        );
    }
}
