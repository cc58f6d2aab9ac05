// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced to callers of the SDK.
///
/// Delivery failures (rejected payloads, exhausted retries, transport errors) are not errors:
/// they are reported through [`crate::sender::Response::Failure`]. Only conditions that make a
/// send impossible to attempt end up here.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a single HTTP submission.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(reqwest::Error),

    #[error("request failed: {0}")]
    Request(reqwest::Error),

    #[error("failed to compress payload: {0}")]
    Compression(#[from] std::io::Error),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err)
        } else {
            TransportError::Request(err)
        }
    }
}
