// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record and batch value types.
//!
//! Records are immutable once built. A batch owns its records and shares its common properties
//! with every batch derived from it when the sender has to split an oversized payload.

pub mod attributes;
pub mod batch;
pub mod metric;
pub mod span;

pub use attributes::{AttributeValue, Attributes};
pub use batch::{Batch, CommonProperties, MetricBatch, MetricCommon, Record, SpanBatch, SpanCommon};
pub use metric::{Metric, MetricBuilder, MetricType, MetricValue, SummaryValue};
pub use span::{Span, SpanBuilder};
