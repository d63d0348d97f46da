//! One-shot (`Mono`) metrics subscriber.
//!
//! A value delivery is itself terminal: the subscriber records a completion,
//! forwards the value and immediately forwards `on_complete`. Anything the
//! upstream sends after that (including its own completion) is counted as
//! malformed and never reaches the consumer.
//!
//! The consumer is released once it has seen its terminal signal, or on
//! cancel, so a consumer holding on to its subscription does not keep the
//! pair alive.

use crate::clock::Clock;
use crate::meter::{FlowMeter, FlowState};
use crate::protocol::{validate_request, validate_subscription, Hooks, Subscriber, Subscription};
use crate::registry::MeterRegistry;
use common::types::{Percentiles, TagSet};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::debug;

/// Metering proxy between a one-shot upstream and its consumer.
///
/// Acts as the upstream's subscriber and as the consumer's subscription.
pub struct MonoMetricsSubscriber<T, E> {
    actual: Mutex<Option<Arc<dyn Subscriber<T, E>>>>,
    hooks: Hooks,
    meter: FlowMeter,
    subscription: OnceLock<Arc<dyn Subscription>>,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T, E> MonoMetricsSubscriber<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    /// Wrap `actual`. Nothing is recorded until a subscription arrives.
    pub fn new(
        actual: Arc<dyn Subscriber<T, E>>,
        registry: MeterRegistry,
        clock: Arc<dyn Clock>,
        tags: Arc<TagSet>,
        percentiles: Option<Arc<Percentiles>>,
    ) -> Arc<Self> {
        let hooks = actual.hooks();
        Arc::new_cyclic(|this| Self {
            actual: Mutex::new(Some(actual)),
            hooks,
            meter: FlowMeter::new(registry, clock, tags, percentiles),
            subscription: OnceLock::new(),
            done: AtomicBool::new(false),
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

    /// Take the consumer out; later signals have nowhere to go.
    fn release(&self) -> Option<Arc<dyn Subscriber<T, E>>> {
        self.actual
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Flip the done flag; `true` if this call terminated the flow.
    fn terminate(&self) -> bool {
        !self.done.swap(true, Ordering::AcqRel)
    }
}

impl<T, E> Subscriber<T, E> for MonoMetricsSubscriber<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if !validate_subscription(&self.subscription, subscription, &self.hooks) {
            return;
        }
        self.meter.subscribed();
        if let (Some(this), Some(actual)) = (self.this.upgrade(), self.actual()) {
            actual.on_subscribe(this);
        }
    }

    fn on_next(&self, value: T) {
        if !self.terminate() {
            self.meter.malformed();
            self.hooks.on_next_dropped(value);
            return;
        }
        // Value delivery and completion are metered identically
        self.meter.completed();
        match self.release() {
            Some(actual) => {
                actual.on_next(value);
                actual.on_complete();
            }
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

impl<T, E> Subscription for MonoMetricsSubscriber<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    fn request(&self, n: i64) {
        if !validate_request(n, &self.hooks) {
            return;
        }
        if let Some(upstream) = self.subscription.get() {
            upstream.request(n);
        }
    }

    /// Always recorded, even after a terminal signal.
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
