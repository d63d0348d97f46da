//! Observability module for instrumented flows.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `reactor_subscribed_total` | Counter | flow tags | Accepted subscriptions |
//! | `reactor_malformed_source_total` | Counter | flow tags | Signals after termination |
//! | `reactor_flow_duration_seconds` | Histogram | flow tags, `status`, `exception` | Subscription to termination/cancel |
//! | `reactor_flow_duration_seconds_percentile` | Gauge | flow tags, `status`, `exception`, `quantile` | Duration quantiles (decorators with percentiles) |
//! | `reactor_onnext_delay_seconds` | Histogram | flow tags | Gap between values (multi-value flows) |
//! | `reactor_requested_amount` | Histogram | flow tags | Request amounts (named multi-value flows) |
//!
//! Flow tags are `type` (`Mono`/`Flux`), `flow` (the resolved name) and any
//! tags set on the publisher.

pub mod metrics;

// Re-exports for convenience
pub use self::metrics::{
    build_metrics_recorder, init_metrics_recorder, record_cancel, record_completion,
    record_error, record_malformed, record_on_next_delay, record_requested, record_subscribe,
};
