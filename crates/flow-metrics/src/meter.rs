//! Per-subscription metering shared by the one-shot and multi-value
//! subscribers.
//!
//! A [`FlowMeter`] owns the timer sample of one subscription and knows the
//! series identity (tags, registry, percentiles) to record into. Subscribers
//! decide *when* a signal is a subscribe, terminal, cancel or malformed
//! event; the meter decides *what* gets recorded for it.

use crate::clock::{Clock, TimerSample};
use crate::observability::metrics;
use crate::registry::MeterRegistry;
use common::types::{Percentiles, TagSet};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Lifecycle of a metered subscription. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No subscription accepted yet.
    Unsubscribed,
    /// Subscribed, no terminal signal seen.
    Active,
    /// A terminal signal was seen; further signals are malformed.
    Terminated,
}

impl FlowState {
    /// Derive the state from the subscription cell and the done flag.
    #[must_use]
    pub const fn from_flags(subscribed: bool, done: bool) -> Self {
        match (subscribed, done) {
            (_, true) => FlowState::Terminated,
            (true, false) => FlowState::Active,
            (false, false) => FlowState::Unsubscribed,
        }
    }
}

/// Records the lifecycle events of one subscription.
#[derive(Debug)]
pub struct FlowMeter {
    tags: Arc<TagSet>,
    registry: MeterRegistry,
    clock: Arc<dyn Clock>,
    percentiles: Option<Arc<Percentiles>>,
    sample: OnceLock<TimerSample>,
}

impl FlowMeter {
    /// Create a meter with no sample started yet.
    #[must_use]
    pub fn new(
        registry: MeterRegistry,
        clock: Arc<dyn Clock>,
        tags: Arc<TagSet>,
        percentiles: Option<Arc<Percentiles>>,
    ) -> Self {
        Self {
            tags,
            registry,
            clock,
            percentiles,
            sample: OnceLock::new(),
        }
    }

    /// Tags identifying the series.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Registry the meter records into.
    #[must_use]
    pub fn registry(&self) -> &MeterRegistry {
        &self.registry
    }

    /// Clock the sample is measured with.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The sample, once the subscription has been accepted.
    #[must_use]
    pub fn sample(&self) -> Option<&TimerSample> {
        self.sample.get()
    }

    /// Count the subscription and start the sample.
    pub fn subscribed(&self) {
        metrics::record_subscribe(&self.tags, &self.registry);
        if self.sample.set(TimerSample::start(&self.clock)).is_err() {
            debug!(target: "flow_metrics.meter", "Timer sample already started");
        }
    }

    /// Record successful termination.
    pub fn completed(&self) {
        if let Some(sample) = self.started("completed") {
            metrics::record_completion(&self.tags, &self.registry, sample, self.percentiles());
        }
    }

    /// Record termination with `error`.
    pub fn errored<E: ?Sized>(&self, error: &E) {
        if let Some(sample) = self.started("error") {
            metrics::record_error(&self.tags, &self.registry, sample, self.percentiles(), error);
        }
    }

    /// Record a cancellation, measured from the same start as any earlier
    /// terminal event.
    pub fn cancelled(&self) {
        if let Some(sample) = self.started("cancelled") {
            metrics::record_cancel(&self.tags, &self.registry, sample, self.percentiles());
        }
    }

    /// Count a signal received after termination.
    pub fn malformed(&self) {
        metrics::record_malformed(&self.tags, &self.registry);
    }

    fn percentiles(&self) -> Option<&Percentiles> {
        self.percentiles.as_deref()
    }

    fn started(&self, event: &'static str) -> Option<&TimerSample> {
        let sample = self.sample.get();
        if sample.is_none() {
            debug!(
                target: "flow_metrics.meter",
                event,
                "Event before subscription, duration not recorded"
            );
        }
        sample
    }
}
