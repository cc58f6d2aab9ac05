// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::TelemetryError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribute map of a record or a batch.
///
/// Ordering carries no meaning for the ingest API; a sorted map keeps the wire output
/// deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttributeValue {
    /// `false` for NaN and infinite floats, which have no JSON representation.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            AttributeValue::Float(value) => value.is_finite(),
            _ => true,
        }
    }
}

/// Rejects attribute maps holding a value that cannot be written as JSON.
pub(crate) fn validate(attributes: &Attributes, owner: &str) -> Result<(), TelemetryError> {
    match attributes.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, value)) => Err(TelemetryError::InvalidRecord(format!(
            "{owner} has a non-finite value for attribute {key}: {value:?}"
        ))),
        None => Ok(()),
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}
