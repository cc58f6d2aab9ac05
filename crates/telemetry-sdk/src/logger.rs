// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log formatting for the SDK.
//!
//! Every line is prefixed with `TELEMETRY_SDK` so that SDK diagnostics can be told apart from the
//! host application's own logs:
//!
//! ```text
//! TELEMETRY_SDK | LEVEL | [span_name{span_fields}:] message {event_fields}
//! TELEMETRY_SDK | WARN | SPANS | Received 408 Request Timeout, retrying in 5s (retry 1 of 8)
//! ```
//!
//! Applications that already install a `tracing` subscriber do not need this module; the SDK only
//! emits events through the `tracing` macros.

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "TELEMETRY_SDK | {} | ", metadata.level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs a global fmt subscriber using [`Formatter`].
///
/// `log_level` is an `EnvFilter` directive such as `info` or `telemetry_sdk=debug`; an invalid
/// directive falls back to `info`. Returns an error if a global subscriber is already set.
pub fn init(log_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .event_format(Formatter)
        .with_env_filter(env_filter)
        .finish()
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock poisoned").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().expect("lock poisoned").clone()).expect("utf-8 logs")
        }
    }

    fn with_formatter(f: impl FnOnce()) -> String {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(Formatter)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    #[test]
    fn test_prefix_and_level() {
        let output = with_formatter(|| tracing::warn!("SPANS | retrying"));
        assert_eq!(output, "TELEMETRY_SDK | WARN | SPANS | retrying\n");
    }

    #[test]
    fn test_event_fields() {
        let output = with_formatter(|| tracing::info!(attempts = 3, "delivered"));
        assert_eq!(output, "TELEMETRY_SDK | INFO | delivered attempts=3\n");
    }

    #[test]
    fn test_span_context() {
        let output = with_formatter(|| {
            let span = tracing::info_span!("send_batch", records = 4);
            let _guard = span.enter();
            tracing::debug!("sending");
        });
        assert_eq!(
            output,
            "TELEMETRY_SDK | DEBUG | send_batch{records=4}: sending\n"
        );
    }
}
