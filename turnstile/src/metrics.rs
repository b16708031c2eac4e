//! Prometheus metrics instrumentation for turnstile.
//!
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `turnstile_transitions_total` - Participant transitions by kind
//!   (joined, promoted, confirmed, draft_expired, session_expired, left)
//!
//! ## Gauges
//! - `turnstile_participants` - Current participants per status
//! - `turnstile_capacity` - Configured `max_connected`
//!
//! ## Histograms
//! - `turnstile_wait_seconds` - Time from join to promotion
//! - `turnstile_sweep_duration_seconds` - Wall time of one sweep
#![cfg(feature = "metrics")]

use prometheus::{
    exponential_buckets, CounterVec, Gauge, GaugeVec, Histogram, HistogramOpts, Opts,
    Registry,
};
use std::sync::LazyLock;

/// Global Prometheus registry for turnstile metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for participant state transitions.
///
/// Labels:
/// - `transition`: joined, promoted, confirmed, draft_expired, session_expired, left
pub static TRANSITIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "turnstile_transitions_total",
        "Total number of participant transitions",
    );
    CounterVec::new(opts, &["transition"])
        .expect("turnstile_transitions_total metric creation failed")
});

/// Gauge for participants currently in each status.
///
/// Labels:
/// - `status`: waiting, draft, connected
pub static PARTICIPANTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new("turnstile_participants", "Current participants per status");
    GaugeVec::new(opts, &["status"]).expect("turnstile_participants metric creation failed")
});

pub static CAPACITY: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new("turnstile_capacity", "Configured maximum draft + connected participants")
        .expect("turnstile_capacity metric creation failed")
});

/// Histogram for seconds spent waiting before promotion.
pub static WAIT_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let buckets = exponential_buckets(1.0, 2.0, 14).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "turnstile_wait_seconds",
        "Seconds between join and promotion to draft",
    )
    .buckets(buckets);
    Histogram::with_opts(opts).expect("turnstile_wait_seconds metric creation failed")
});

/// Histogram for sweep execution time in seconds.
pub static SWEEP_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.00001, 2.0, 15).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "turnstile_sweep_duration_seconds",
        "Wall time spent in one admission sweep",
    )
    .buckets(buckets);
    Histogram::with_opts(opts).expect("turnstile_sweep_duration_seconds metric creation failed")
});

/// Initialize all metrics by registering them with the global registry.
///
/// This function is idempotent - calling it multiple times is safe.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(TRANSITIONS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(PARTICIPANTS.clone()),
        Box::new(CAPACITY.clone()),
        Box::new(WAIT_SECONDS.clone()),
        Box::new(SWEEP_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            let msg = e.to_string();
            if !msg.contains("Duplicate metrics collector registration attempted") {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_transition(transition: &str) {
    TRANSITIONS_TOTAL.with_label_values(&[transition]).inc();
}

pub fn set_participants(status: &str, count: f64) {
    PARTICIPANTS.with_label_values(&[status]).set(count);
}

pub fn set_capacity(capacity: f64) {
    CAPACITY.set(capacity);
}

pub fn observe_wait(seconds: f64) {
    WAIT_SECONDS.observe(seconds);
}

pub fn observe_sweep_duration(seconds: f64) {
    SWEEP_DURATION_SECONDS.observe(seconds);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
