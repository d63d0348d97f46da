//! Multi-value (`Flux`) metrics subscriber.
//!
//! Same lifecycle metering as the one-shot variant, without completion
//! fusion: values are forwarded as they arrive and only `on_complete` /
//! `on_error` terminate. Each value additionally records the delay since the
//! subscription or the previous value, and named flows record request
//! amounts. As with the one-shot variant, the consumer is released after
//! its terminal signal or on cancel.

use crate::clock::Clock;
use crate::meter::{FlowMeter, FlowState};
use crate::observability::metrics;
use crate::protocol::{validate_request, validate_subscription, Hooks, Subscriber, Subscription};
use crate::registry::MeterRegistry;
use common::types::{Percentiles, TagSet};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Instant;
use tracing::debug;

/// Metering proxy between a multi-value upstream and its consumer.
pub struct FluxMetricsSubscriber<T, E> {
    actual: Mutex<Option<Arc<dyn Subscriber<T, E>>>>,
    hooks: Hooks,
    meter: FlowMeter,
    subscription: OnceLock<Arc<dyn Subscription>>,
    done: AtomicBool,
    last_event: Mutex<Option<Instant>>,
    track_requests: bool,
    this: Weak<Self>,
}

impl<T, E> FluxMetricsSubscriber<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    /// Wrap `actual`. `track_requests` enables `reactor_requested_amount`.
    pub fn new(
        actual: Arc<dyn Subscriber<T, E>>,
        registry: MeterRegistry,
        clock: Arc<dyn Clock>,
        tags: Arc<TagSet>,
        percentiles: Option<Arc<Percentiles>>,
        track_requests: bool,
    ) -> Arc<Self> {
        let hooks = actual.hooks();
        Arc::new_cyclic(|this| Self {
            actual: Mutex::new(Some(actual)),
            hooks,
            meter: FlowMeter::new(registry, clock, tags, percentiles),
            subscription: OnceLock::new(),
            done: AtomicBool::new(false),
            last_event: Mutex::new(None),
            track_requests,
            this: this.clone(),
        })
    }

    /// Current protocol state.
    #[must_use]
    pub fn state(&self) -> FlowState {
        FlowState::from_flags(
            self.subscription.get().is_some(),
            self.done.load(Ordering::Acquire),
        )
    }

    /// The consumer this subscriber forwards to, until it is released.
    #[must_use]
    pub fn actual(&self) -> Option<Arc<dyn Subscriber<T, E>>> {
        self.actual
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn release(&self) -> Option<Arc<dyn Subscriber<T, E>>> {
        self.actual
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn terminate(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }

    /// Mark `now` as the latest event and return the time since the previous one.
    fn mark_event(&self, now: Instant) -> std::time::Duration {
        let mut last = self
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let delay = last
            .map(|previous| now.saturating_duration_since(previous))
            .unwrap_or_default();
        *last = Some(now);
        delay
    }
}

impl<T, E> Subscriber<T, E> for FluxMetricsSubscriber<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !validate_subscription(&self.subscription, subscription, &self.hooks) {
            return;
        }
        self.meter.subscribed();
        self.mark_event(self.meter.clock().now());
        if let (Some(this), Some(actual)) = (self.this.upgrade(), self.actual()) {
            actual.on_subscribe(this);
        }
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) {
            self.meter.malformed();
            self.hooks.on_next_dropped(value);
            return;
        }
        let delay = self.mark_event(self.meter.clock().now());
        metrics::record_on_next_delay(self.meter.tags(), self.meter.registry(), delay);
        match self.actual() {
            Some(actual) => actual.on_next(value),
            None => debug!(target: "flow_metrics.meter", "Value after cancel discarded"),
        }
    }

    fn on_error(&self, error: E) {
        if !self.terminate() {
            self.meter.malformed();
            self.hooks.on_error_dropped(error);
            return;
        }
        self.meter.errored(&error);
        if let Some(actual) = self.release() {
            actual.on_error(error);
        }
    }

    fn on_complete(&self) {
        if !self.terminate() {
            self.meter.malformed();
            return;
        }
        self.meter.completed();
        if let Some(actual) = self.release() {
            actual.on_complete();
        }
    }

    fn hooks(&self) -> Hooks {
        self.hooks.clone()
    }
}

impl<T, E> Subscription for FluxMetricsSubscriber<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    fn request(&self, n: i64) {
        if !validate_request(n, &self.hooks) {
            return;
        }
        if self.track_requests {
            metrics::record_requested(self.meter.tags(), self.meter.registry(), n);
        }
        if let Some(upstream) = self.subscription.get() {
            upstream.request(n);
        }
    }

    fn cancel(&self) {
        let Some(upstream) = self.subscription.get() else {
            debug!(target: "flow_metrics.meter", "Cancel before subscription ignored");
            return;
        };
        self.meter.cancelled();
        upstream.cancel();
        drop(self.release());
    }
}
