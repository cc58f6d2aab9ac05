// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::TelemetryError;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TRACE_URL: &str = "https://trace-api.newrelic.com/trace/v1";
pub const DEFAULT_METRIC_URL: &str = "https://metric-api.newrelic.com/metric/v1";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 8;
pub const DEFAULT_BACKOFF_DELAY_FACTOR_SECONDS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECONDS: u64 = 80;

/// Settings shared by every sender created from it.
///
/// The struct deserializes with `#[serde(default)]`, so callers can populate it from whatever
/// source they use (a JSON/YAML document, an environment adapter) and only override the keys
/// they care about. It is never mutated once a sender has been built from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfiguration {
    /// Ingest API key, sent in the `Api-Key` header
    pub api_key: Option<String>,
    /// Endpoint receiving span batches
    pub trace_url: String,
    /// Endpoint receiving metric batches
    pub metric_url: String,
    /// Log every payload at debug level. Payloads may contain sensitive attribute values.
    pub audit_logging_enabled: bool,
    /// Timeout for a single HTTP submission, in seconds
    pub send_timeout_secs: u64,
    /// Maximum number of retries for a 408/429 response before giving up
    pub max_retry_attempts: u32,
    /// Base of the exponential backoff, in seconds
    pub backoff_delay_factor_seconds: u64,
    /// Upper bound of a single backoff delay, in seconds
    pub backoff_max_seconds: u64,
    /// Applied as `service.name` to span batches that do not carry one
    pub service_name: Option<String>,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for TelemetryConfiguration {
    fn default() -> Self {
        Self {
            api_key: None,
            trace_url: DEFAULT_TRACE_URL.to_string(),
            metric_url: DEFAULT_METRIC_URL.to_string(),
            audit_logging_enabled: false,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff_delay_factor_seconds: DEFAULT_BACKOFF_DELAY_FACTOR_SECONDS,
            backoff_max_seconds: DEFAULT_BACKOFF_MAX_SECONDS,
            service_name: None,
            https_proxy: None,
        }
    }
}

impl TelemetryConfiguration {
    /// Convenience constructor for the common case of defaults plus an API key.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Returns the API key if it is set and not blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.api_key().is_none() {
            return Err(TelemetryError::InvalidConfig(
                "an API key is required".to_string(),
            ));
        }

        for (name, url) in [("trace_url", &self.trace_url), ("metric_url", &self.metric_url)] {
            if let Err(e) = reqwest::Url::parse(url) {
                return Err(TelemetryError::InvalidConfig(format!(
                    "{name} '{url}' is not a valid URL: {e}"
                )));
            }
        }

        if self.send_timeout_secs == 0 {
            return Err(TelemetryError::InvalidConfig(
                "send_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.backoff_max_seconds < self.backoff_delay_factor_seconds {
            return Err(TelemetryError::InvalidConfig(format!(
                "backoff_max_seconds ({}) must not be lower than backoff_delay_factor_seconds ({})",
                self.backoff_max_seconds, self.backoff_delay_factor_seconds
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfiguration::default();
        assert_eq!(config.max_retry_attempts, 8);
        assert_eq!(config.backoff_delay_factor_seconds, 5);
        assert_eq!(config.backoff_max_seconds, 80);
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert!(!config.audit_logging_enabled);
        assert_eq!(config.trace_url, DEFAULT_TRACE_URL);
        assert_eq!(config.metric_url, DEFAULT_METRIC_URL);
    }

    #[test]
    fn test_default_config_requires_api_key() {
        let config = TelemetryConfiguration::default();
        assert!(matches!(
            config.validate(),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        let config = TelemetryConfiguration::with_api_key("   ");
        assert_eq!(config.api_key(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_api_key_is_valid() {
        let config = TelemetryConfiguration::with_api_key("abc123");
        assert_eq!(config.api_key(), Some("abc123"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_url() {
        let config = TelemetryConfiguration {
            trace_url: "not a url".to_string(),
            ..TelemetryConfiguration::with_api_key("abc123")
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trace_url"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = TelemetryConfiguration {
            send_timeout_secs: 0,
            ..TelemetryConfiguration::with_api_key("abc123")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_backoff_bounds() {
        let config = TelemetryConfiguration {
            backoff_delay_factor_seconds: 10,
            backoff_max_seconds: 5,
            ..TelemetryConfiguration::with_api_key("abc123")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_document() {
        let config: TelemetryConfiguration = serde_json::from_str(
            r#"{"api_key":"abc123","max_retry_attempts":3,"service_name":"checkout"}"#,
        )
        .expect("failed to deserialize configuration");

        assert_eq!(config.api_key(), Some("abc123"));
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.service_name.as_deref(), Some("checkout"));
        assert_eq!(config.backoff_max_seconds, DEFAULT_BACKOFF_MAX_SECONDS);
        assert_eq!(config.trace_url, DEFAULT_TRACE_URL);
    }
}
