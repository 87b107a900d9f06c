//! A wrapper around the `prometheus` crate that provides a global, `lazy_static`-free
//! metrics registry and functions to add and use the following components (more info at
//! [Prometheus docs](https://prometheus.io/docs/concepts/metric_types/)):
//!
//! - `Histogram`: used with `start_timer()`/`observe_duration()` or
//!   `observe()` method to record distributions of values (e.g., run times).
//! - `IntCounter`: used to represent an ideally ever-growing, never-shrinking
//!   integer (e.g., number of block processing requests).
//! - `IntGauge`: used to represent an varying integer (e.g., number of
//!   attestations per block).
//!
//! ## Important
//!
//! Metrics will fail if two items have the same `name`. All metrics must have a unique `name`.
//! Because we use a global registry there is no namespace per crate, it's one big global space.
//!
//! See the [Prometheus naming best practices](https://prometheus.io/docs/practices/naming/) when
//! choosing metric names.
//!
//! Metrics are declared as `LazyLock` statics; a metric that fails to register
//! degrades to a no-op rather than panicking, so a collision or a disabled
//! registry never takes down the caller.

use prometheus::{HistogramOpts, Opts, TextEncoder};
use std::time::Duration;

pub use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramTimer, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec, Result, proto::MetricFamily,
};

/// Collect all the metrics for reporting.
pub fn gather() -> Vec<MetricFamily> {
    prometheus::gather()
}

/// Attempts to create an `IntCounter`, returning `Err` if the registry does not accept the counter
/// (potentially due to naming conflict).
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Attempts to create an `IntGauge`, returning `Err` if the registry does not accept the gauge
/// (potentially due to naming conflict).
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let opts = Opts::new(name, help);
    let gauge = IntGauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Gauge`, returning `Err` if the registry does not accept the gauge
/// (potentially due to naming conflict).
pub fn try_create_float_gauge(name: &str, help: &str) -> Result<Gauge> {
    let opts = Opts::new(name, help);
    let gauge = Gauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Histogram`, returning `Err` if the registry does not accept the counter
/// (potentially due to naming conflict).
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    let opts = HistogramOpts::new(name, help);
    let histogram = Histogram::with_opts(opts)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Attempts to create a `HistogramVec`, returning `Err` if the registry does not accept the
/// histogram.
pub fn try_create_histogram_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<HistogramVec> {
    let opts = HistogramOpts::new(name, help);
    let histogram_vec = HistogramVec::new(opts, label_names)?;
    prometheus::register(Box::new(histogram_vec.clone()))?;
    Ok(histogram_vec)
}

/// Attempts to create a `IntGaugeVec`, returning `Err` if the registry does not accept the gauge.
pub fn try_create_int_gauge_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntGaugeVec> {
    let opts = Opts::new(name, help);
    let gauge_vec = IntGaugeVec::new(opts, label_names)?;
    prometheus::register(Box::new(gauge_vec.clone()))?;
    Ok(gauge_vec)
}

/// Attempts to create a `IntCounterVec`, returning `Err` if the registry does not accept the
/// counter.
pub fn try_create_int_counter_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntCounterVec> {
    let opts = Opts::new(name, help);
    let counter_vec = IntCounterVec::new(opts, label_names)?;
    prometheus::register(Box::new(counter_vec.clone()))?;
    Ok(counter_vec)
}

/// If `int_gauge_vec.is_ok()`, returns a gauge with the given `name`.
pub fn get_int_gauge(int_gauge_vec: &Result<IntGaugeVec>, name: &[&str]) -> Option<IntGauge> {
    Some(int_gauge_vec.as_ref().ok()?.get_metric_with_label_values(name).ok()?)
}

/// If `histogram_vec.is_ok()`, returns a histogram with the given `name`.
pub fn get_histogram(histogram_vec: &Result<HistogramVec>, name: &[&str]) -> Option<Histogram> {
    Some(histogram_vec.as_ref().ok()?.get_metric_with_label_values(name).ok()?)
}

/// Starts a timer for the given `Histogram`, stopping when it gets dropped or given to
/// `stop_timer(..)`.
pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    Some(histogram.as_ref().ok()?.start_timer())
}

/// Starts a timer on `vec` with the given `name`.
pub fn start_timer_vec(
    vec: &Result<HistogramVec>,
    name: &[&str],
) -> Option<HistogramTimer> {
    get_histogram(vec, name).map(|h| h.start_timer())
}

/// Stops a timer created with `start_timer(..)`.
pub fn stop_timer(timer: Option<HistogramTimer>) {
    if let Some(t) = timer {
        t.observe_duration();
    }
}

pub fn observe(histogram: &Result<Histogram>, value: f64) {
    if let Ok(histogram) = histogram {
        histogram.observe(value);
    }
}

pub fn observe_duration(histogram: &Result<Histogram>, duration: Duration) {
    if let Ok(histogram) = histogram {
        histogram.observe(duration.as_secs_f64());
    }
}

pub fn observe_vec(vec: &Result<HistogramVec>, name: &[&str], value: f64) {
    if let Some(h) = get_histogram(vec, name) {
        h.observe(value);
    }
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn inc_counter_by(counter: &Result<IntCounter>, value: u64) {
    if let Ok(counter) = counter {
        counter.inc_by(value);
    }
}

pub fn inc_counter_vec(counter_vec: &Result<IntCounterVec>, name: &[&str]) {
    if let Ok(counter_vec) = counter_vec {
        if let Ok(counter) = counter_vec.get_metric_with_label_values(name) {
            counter.inc();
        }
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

pub fn set_gauge_vec(int_gauge_vec: &Result<IntGaugeVec>, name: &[&str], value: i64) {
    if let Some(gauge) = get_int_gauge(int_gauge_vec, name) {
        gauge.set(value);
    }
}

pub fn inc_gauge(gauge: &Result<IntGauge>) {
    if let Ok(gauge) = gauge {
        gauge.inc();
    }
}

pub fn dec_gauge(gauge: &Result<IntGauge>) {
    if let Ok(gauge) = gauge {
        gauge.dec();
    }
}

pub fn set_float_gauge(gauge: &Result<Gauge>, value: f64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

/// Renders every metric in the default registry in the Prometheus text
/// exposition format.
pub fn write<W: std::io::Write>(writer: &mut W) -> std::io::Result<()> {
    let encoder = TextEncoder::new();
    encoder
        .encode(&gather(), writer)
        .map_err(|e| std::io::Error::other(format!("failed to encode metrics: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static TEST_COUNTER: LazyLock<Result<IntCounter>> =
        LazyLock::new(|| try_create_int_counter("metrics_test_total", "counter used in tests"));
    static TEST_HISTOGRAM: LazyLock<Result<Histogram>> = LazyLock::new(|| {
        try_create_histogram("metrics_test_seconds", "histogram used in tests")
    });
    static TEST_GAUGE_VEC: LazyLock<Result<IntGaugeVec>> = LazyLock::new(|| {
        try_create_int_gauge_vec("metrics_test_gauge", "gauge vec used in tests", &["kind"])
    });

    #[test]
    fn duplicate_registration_degrades_to_noop() {
        let first = try_create_int_counter("metrics_duplicate_total", "first");
        let second = try_create_int_counter("metrics_duplicate_total", "second");
        assert!(first.is_ok());
        assert!(second.is_err());
        // Operating on the failed handle must not panic.
        inc_counter(&second);
    }

    #[test]
    fn text_exposition_includes_observations() {
        inc_counter(&TEST_COUNTER);
        observe(&TEST_HISTOGRAM, 0.5);
        set_gauge_vec(&TEST_GAUGE_VEC, &["hit"], 3);

        let mut out = Vec::new();
        write(&mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();

        assert!(rendered.contains("metrics_test_total"));
        assert!(rendered.contains("metrics_test_seconds"));
        assert!(rendered.contains("kind=\"hit\""));
    }

    #[test]
    fn timers_observe_on_stop() {
        let timer = start_timer(&TEST_HISTOGRAM);
        assert!(timer.is_some());
        stop_timer(timer);
    }
}
