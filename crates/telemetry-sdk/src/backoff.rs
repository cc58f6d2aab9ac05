// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retry delays: the capped exponential schedule and the server-provided `Retry-After` value.

use crate::config::TelemetryConfiguration;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Configuration parameters for exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first retry; doubled on every further retry.
    pub delay_factor: Duration,
    /// Upper bound of a single delay.
    pub max_backoff: Duration,
}

impl BackoffConfig {
    #[must_use]
    pub fn from_config(config: &TelemetryConfiguration) -> Self {
        Self {
            delay_factor: Duration::from_secs(config.backoff_delay_factor_seconds),
            max_backoff: Duration::from_secs(config.backoff_max_seconds),
        }
    }

    /// Delay before retry number `retry_num` (1-based): `min(max, factor * 2^(retry_num - 1))`.
    #[must_use]
    pub fn delay_for(&self, retry_num: u32) -> Duration {
        let exponent = retry_num.saturating_sub(1);
        let multiplier = 1_u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.delay_factor
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
            .min(self.max_backoff)
    }
}

/// Reads the `Retry-After` header of a response.
///
/// Accepts both forms of RFC 7231: delta-seconds and an HTTP-date. A date is turned into a delay
/// relative to `now`; dates in the past yield a zero delay. Returns `None` when the header is
/// missing or unparseable.
#[must_use]
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        date.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
