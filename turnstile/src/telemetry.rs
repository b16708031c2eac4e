//! Tracing and telemetry instrumentation for turnstile.
//!
//! Span constructors for each queue operation, plus `record_*` helpers
//! that emit a structured log event and, with the `metrics` feature,
//! update the Prometheus collectors in [`crate::metrics`]. Every helper
//! works with the feature disabled.

use tracing::{info_span, Span};

use crate::engine::SweepReport;

/// Span for a `join` call.
#[must_use]
pub fn join_span(participant_id: impl AsRef<str>) -> Span {
    info_span!("turnstile.join", participant_id = %participant_id.as_ref())
}

/// Span for a `status` call.
#[must_use]
pub fn status_span(participant_id: impl AsRef<str>) -> Span {
    info_span!("turnstile.status", participant_id = %participant_id.as_ref())
}

/// Span for a `confirm` call.
#[must_use]
pub fn confirm_span(participant_id: impl AsRef<str>, now: i64) -> Span {
    info_span!(
        "turnstile.confirm",
        participant_id = %participant_id.as_ref(),
        now = now,
    )
}

/// Span for a `delete` call.
#[must_use]
pub fn leave_span(participant_id: impl AsRef<str>) -> Span {
    info_span!("turnstile.leave", participant_id = %participant_id.as_ref())
}

/// Span for an `estimate_wait` call.
#[must_use]
pub fn estimate_span(participant_id: impl AsRef<str>) -> Span {
    info_span!("turnstile.estimate_wait", participant_id = %participant_id.as_ref())
}

/// Span for a `metrics` call.
#[must_use]
pub fn metrics_span(participant_id: Option<&str>) -> Span {
    info_span!("turnstile.metrics", participant_id = participant_id.unwrap_or(""))
}

/// Span for one admission sweep.
#[must_use]
pub fn sweep_span(now: i64) -> Span {
    info_span!("turnstile.sweep", now = now)
}

pub fn record_joined(participant_id: impl AsRef<str>) {
    tracing::info!(participant_id = %participant_id.as_ref(), "participant joined");

    #[cfg(feature = "metrics")]
    crate::metrics::record_transition("joined");
}

/// Record a waiting -> draft promotion after `waited_seconds` in line.
pub fn record_promoted(participant_id: impl AsRef<str>, waited_seconds: u64) {
    tracing::info!(
        participant_id = %participant_id.as_ref(),
        waited_seconds = waited_seconds,
        "participant moved to draft"
    );

    #[cfg(feature = "metrics")]
    {
        crate::metrics::record_transition("promoted");
        crate::metrics::observe_wait(waited_seconds as f64);
    }
}

pub fn record_confirmed(participant_id: impl AsRef<str>, session_duration: u64) {
    tracing::info!(
        participant_id = %participant_id.as_ref(),
        session_duration = session_duration,
        "participant connected"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_transition("confirmed");
}

/// Record a draft or session that timed out. `state` is the status it
/// expired from.
pub fn record_expired(participant_id: impl AsRef<str>, state: impl AsRef<str>) {
    tracing::info!(
        participant_id = %participant_id.as_ref(),
        state = %state.as_ref(),
        "participant expired"
    );

    #[cfg(feature = "metrics")]
    {
        let transition = match state.as_ref() {
            "draft" => "draft_expired",
            _ => "session_expired",
        };
        crate::metrics::record_transition(transition);
    }
}

pub fn record_left(participant_id: impl AsRef<str>, state: impl AsRef<str>) {
    tracing::info!(
        participant_id = %participant_id.as_ref(),
        state = %state.as_ref(),
        "participant left"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_transition("left");
}

/// Update the per-status occupancy gauges.
pub fn set_occupancy(waiting: usize, draft: usize, connected: usize, capacity: usize) {
    tracing::debug!(
        waiting = waiting,
        draft = draft,
        connected = connected,
        capacity = capacity,
        "queue occupancy updated"
    );

    #[cfg(feature = "metrics")]
    {
        crate::metrics::set_participants("waiting", waiting as f64);
        crate::metrics::set_participants("draft", draft as f64);
        crate::metrics::set_participants("connected", connected as f64);
        crate::metrics::set_capacity(capacity as f64);
    }
}

/// Record the outcome of a sweep that took `elapsed`.
pub fn record_sweep(report: &SweepReport, elapsed: std::time::Duration) {
    if report.is_noop() {
        tracing::trace!(elapsed_us = elapsed.as_micros() as u64, "sweep found nothing to do");
    } else {
        tracing::debug!(
            expired_drafts = report.expired_drafts,
            expired_sessions = report.expired_sessions,
            promoted = report.promoted,
            elapsed_us = elapsed.as_micros() as u64,
            "sweep applied"
        );
    }

    #[cfg(feature = "metrics")]
    crate::metrics::observe_sweep_duration(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_names() {
        assert_eq!(join_span("a").metadata().unwrap().name(), "turnstile.join");
        assert_eq!(status_span("a").metadata().unwrap().name(), "turnstile.status");
        assert_eq!(confirm_span("a", 1).metadata().unwrap().name(), "turnstile.confirm");
        assert_eq!(leave_span("a").metadata().unwrap().name(), "turnstile.leave");
        assert_eq!(sweep_span(1).metadata().unwrap().name(), "turnstile.sweep");
        assert_eq!(
            estimate_span("a").metadata().unwrap().name(),
            "turnstile.estimate_wait"
        );
        assert_eq!(metrics_span(None).metadata().unwrap().name(), "turnstile.metrics");
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        record_joined("a");
        record_promoted("a", 3);
        record_confirmed("a", 60);
        record_expired("a", "connected");
        record_left("b", "waiting");
        set_occupancy(1, 2, 3, 10);
        record_sweep(&SweepReport::default(), std::time::Duration::from_micros(5));
    }
}
