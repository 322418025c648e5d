//! Operational event log.
//!
//! Resolution outcomes and failures are reported through an [`EventSink`].
//! [`TracingSink`] only emits tracing events; the SQLite store additionally
//! persists each entry so `seo-monitor logs` can show them later.

use chrono::NaiveDateTime;

use crate::model::Severity;

/// Receives categorized operational events.
pub trait EventSink: Send + Sync {
    /// `at` is the event time as seen by the caller's clock.
    fn log(&self, category: &str, message: &str, severity: Severity, at: NaiveDateTime);
}

/// Forwards events to `tracing` at a level matching their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, category: &str, message: &str, severity: Severity, _at: NaiveDateTime) {
        match severity {
            Severity::Debug => tracing::debug!(%category, "{message}"),
            Severity::Event => tracing::info!(%category, "{message}"),
            Severity::Error => tracing::error!(%category, "{message}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Collects events in memory.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub events: Mutex<Vec<(String, String, Severity)>>,
        pub stamps: Mutex<Vec<NaiveDateTime>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<(String, String, Severity)> {
            std::mem::take(&mut *self.events.lock().expect("sink lock"))
        }

        pub(crate) fn stamps(&self) -> Vec<NaiveDateTime> {
            self.stamps.lock().expect("sink lock").clone()
        }
    }

    impl EventSink for RecordingSink {
        fn log(&self, category: &str, message: &str, severity: Severity, at: NaiveDateTime) {
            self.stamps.lock().expect("sink lock").push(at);
            self.events.lock().expect("sink lock").push((
                category.to_string(),
                message.to_string(),
                severity,
            ));
        }
    }

    fn noon() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("valid")
    }

    #[test]
    fn tracing_sink_accepts_every_severity() {
        for severity in [Severity::Debug, Severity::Event, Severity::Error] {
            TracingSink.log("rank", "message", severity, noon());
        }
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::default();
        sink.log("a", "one", Severity::Event, noon());
        sink.log("b", "two", Severity::Error, noon());
        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, "b");
        assert!(sink.take().is_empty());
    }
}
