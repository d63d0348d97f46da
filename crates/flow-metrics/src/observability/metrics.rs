//! Metric definitions for instrumented flows.
//!
//! All metrics follow Prometheus naming conventions:
//! - `reactor_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every series carries the flow's tag set (`type`, `flow`, user tags).
//! Additional labels are bounded:
//! - `status`: 3 values (completed, error, cancelled)
//! - `exception`: bounded by the error types flowing through a publisher
//! - `quantile`: one value per configured percentile, percentile gauges only
//!
//! Request amounts are only recorded for named flows, so anonymous flows
//! add a single series per status.

use crate::clock::TimerSample;
use crate::registry::MeterRegistry;
use common::config::MetricsConfig;
use common::error::FlowMetricsError;
use common::types::{Percentiles, TagSet};
use metrics::{Key, Label, Level, Metadata};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Duration;

/// Counter of accepted subscriptions.
pub const METER_SUBSCRIBED: &str = "reactor_subscribed_total";

/// Counter of signals received after the flow terminated.
pub const METER_MALFORMED: &str = "reactor_malformed_source_total";

/// Histogram of time from subscription to termination or cancellation.
pub const METER_FLOW_DURATION: &str = "reactor_flow_duration_seconds";

/// Gauge of estimated flow duration quantiles, published for flows decorated
/// with their own percentiles.
pub const METER_FLOW_DURATION_PERCENTILE: &str = "reactor_flow_duration_seconds_percentile";

/// Histogram of time between consecutive values (multi-value flows).
pub const METER_ON_NEXT_DELAY: &str = "reactor_onnext_delay_seconds";

/// Histogram of request amounts (named multi-value flows).
pub const METER_REQUESTED: &str = "reactor_requested_amount";

/// Label carrying how a flow ended.
pub const TAG_STATUS: &str = "status";

/// Label carrying the error classification, empty unless `status=error`.
pub const TAG_EXCEPTION: &str = "exception";

/// Label carrying the quantile of a percentile gauge.
pub const TAG_QUANTILE: &str = "quantile";

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Latency buckets for duration histograms when no percentiles are configured.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Build the Prometheus recorder for flow metrics without installing it.
///
/// With percentiles configured, duration histograms render as summaries with
/// those quantiles; otherwise they render with fixed latency buckets.
///
/// # Errors
///
/// Returns `FlowMetricsError::ExporterInstall` if the exporter rejects the
/// quantile or bucket configuration.
pub fn build_metrics_recorder(config: &MetricsConfig) -> Result<PrometheusRecorder, FlowMetricsError> {
    let builder = PrometheusBuilder::new();

    let builder = match config.percentiles.as_ref().filter(|p| !p.is_empty()) {
        Some(percentiles) => builder
            .set_quantiles(percentiles.as_slice())
            .map_err(|e| FlowMetricsError::ExporterInstall(format!("Failed to set quantiles: {e}")))?,
        None => builder
            .set_buckets_for_metric(Matcher::Full(METER_FLOW_DURATION.to_string()), DURATION_BUCKETS)
            .map_err(|e| {
                FlowMetricsError::ExporterInstall(format!("Failed to set flow duration buckets: {e}"))
            })?
            .set_buckets_for_metric(Matcher::Full(METER_ON_NEXT_DELAY.to_string()), DURATION_BUCKETS)
            .map_err(|e| {
                FlowMetricsError::ExporterInstall(format!("Failed to set onNext delay buckets: {e}"))
            })?,
    };

    Ok(builder.build_recorder())
}

/// Install the Prometheus recorder as the process-wide `metrics` recorder and
/// return the handle for rendering.
///
/// Must be called before any flow records through the process registry.
///
/// # Errors
///
/// Returns error if the configuration is rejected or a global recorder is
/// already installed.
pub fn init_metrics_recorder(config: &MetricsConfig) -> Result<PrometheusHandle, FlowMetricsError> {
    let recorder = build_metrics_recorder(config)?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).map_err(|_| {
        FlowMetricsError::ExporterInstall("a global metrics recorder is already installed".to_string())
    })?;
    tracing::info!(target: "flow_metrics.registry", "Prometheus metrics recorder installed");
    Ok(handle)
}

fn labels(tags: &TagSet) -> Vec<Label> {
    tags.iter()
        .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Lifecycle Counters
// ============================================================================

/// Record an accepted subscription.
///
/// Metric: `reactor_subscribed_total`
/// Labels: flow tags
pub fn record_subscribe(tags: &TagSet, registry: &MeterRegistry) {
    let key = Key::from_parts(METER_SUBSCRIBED, labels(tags));
    registry.emit("subscribe", |recorder| {
        recorder.register_counter(&key, &METADATA).increment(1);
    });
}

/// Record a signal received after the flow terminated.
///
/// Metric: `reactor_malformed_source_total`
/// Labels: flow tags
///
/// Counts every signal that arrived after the flow had already terminated.
/// For one-shot flows this includes the upstream's own completion following
/// a value, so a well-behaved single-value source adds one per subscription.
/// Anything beyond that points at a source signalling past its terminal.
pub fn record_malformed(tags: &TagSet, registry: &MeterRegistry) {
    let key = Key::from_parts(METER_MALFORMED, labels(tags));
    registry.emit("malformed", |recorder| {
        recorder.register_counter(&key, &METADATA).increment(1);
    });
}

// ============================================================================
// Flow Duration (Histogram)
// ============================================================================

fn record_flow_duration(
    tags: &TagSet,
    registry: &MeterRegistry,
    sample: &TimerSample,
    percentiles: Option<&Percentiles>,
    status: &'static str,
    exception: &str,
) {
    let elapsed = sample.stop().as_secs_f64();
    let series = tags.and(TAG_STATUS, status).and(TAG_EXCEPTION, exception);
    let key = Key::from_parts(METER_FLOW_DURATION, labels(&series));
    let quantiles = percentiles
        .filter(|p| !p.is_empty())
        .map(|p| registry.observe_quantiles(&key, elapsed, p))
        .unwrap_or_default();

    registry.emit("flow_duration", |recorder| {
        recorder.register_histogram(&key, &METADATA).record(elapsed);
        for (quantile, estimate) in &quantiles {
            let key = Key::from_parts(
                METER_FLOW_DURATION_PERCENTILE,
                labels(&series.and(TAG_QUANTILE, quantile.to_string())),
            );
            recorder.register_gauge(&key, &METADATA).set(*estimate);
        }
    });
}

/// Record successful termination.
///
/// Metric: `reactor_flow_duration_seconds`
/// Labels: flow tags, `status=completed`, `exception=""`
pub fn record_completion(
    tags: &TagSet,
    registry: &MeterRegistry,
    sample: &TimerSample,
    percentiles: Option<&Percentiles>,
) {
    record_flow_duration(tags, registry, sample, percentiles, STATUS_COMPLETED, "");
}

/// Record termination with an error.
///
/// Metric: `reactor_flow_duration_seconds`
/// Labels: flow tags, `status=error`, `exception` = the error's type name
pub fn record_error<E: ?Sized>(
    tags: &TagSet,
    registry: &MeterRegistry,
    sample: &TimerSample,
    percentiles: Option<&Percentiles>,
    error: &E,
) {
    record_flow_duration(
        tags,
        registry,
        sample,
        percentiles,
        STATUS_ERROR,
        error_classification(error),
    );
}

/// Record a cancellation.
///
/// Metric: `reactor_flow_duration_seconds`
/// Labels: flow tags, `status=cancelled`, `exception=""`
pub fn record_cancel(
    tags: &TagSet,
    registry: &MeterRegistry,
    sample: &TimerSample,
    percentiles: Option<&Percentiles>,
) {
    record_flow_duration(tags, registry, sample, percentiles, STATUS_CANCELLED, "");
}

/// Classification recorded in the `exception` label.
///
/// This is the static type name of `E`, not anything derived from the value:
/// every variant of an error enum shares one label, and a boxed
/// `dyn Error` is classified as the box type. Flows that need finer
/// classification should map errors into distinct types before decorating.
#[must_use]
pub fn error_classification<E: ?Sized>(_error: &E) -> &'static str {
    std::any::type_name::<E>()
}

// ============================================================================
// Multi-value Flow Metrics
// ============================================================================

/// Record the delay since subscription or the previous value.
///
/// Metric: `reactor_onnext_delay_seconds`
/// Labels: flow tags
pub fn record_on_next_delay(tags: &TagSet, registry: &MeterRegistry, delay: Duration) {
    let key = Key::from_parts(METER_ON_NEXT_DELAY, labels(tags));
    registry.emit("on_next_delay", |recorder| {
        recorder
            .register_histogram(&key, &METADATA)
            .record(delay.as_secs_f64());
    });
}

/// Record a request amount.
///
/// Metric: `reactor_requested_amount`
/// Labels: flow tags
pub fn record_requested(tags: &TagSet, registry: &MeterRegistry, amount: i64) {
    let key = Key::from_parts(METER_REQUESTED, labels(tags));
    // i64 to f64 loses precision only for unbounded (i64::MAX-ish) requests
    #[allow(clippy::cast_precision_loss)]
    let amount = amount as f64;
    registry.emit("requested", |recorder| {
        recorder.register_histogram(&key, &METADATA).record(amount);
    });
}
