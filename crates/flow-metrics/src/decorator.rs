//! The metrics decorator.
//!
//! [`Metrics`] wraps an upstream publisher. Construction resolves the flow
//! name and tags once; every `subscribe` then installs a fresh metrics
//! subscriber (one-shot or multi-value, following the upstream's arity)
//! between the upstream and the consumer.

use crate::clock::{Clock, SystemClock};
use crate::flux::FluxMetricsSubscriber;
use crate::mono::MonoMetricsSubscriber;
use crate::naming::{default_tags, resolve_name, resolve_tags, Named, DEFAULT_NAME};
use crate::protocol::{Arity, Publisher, Subscriber};
use crate::registry::MeterRegistry;
use common::config::MetricsConfig;
use common::types::{Percentiles, TagSet};
use std::sync::Arc;
use tracing::trace;

/// Publisher that meters every subscription to `upstream`.
pub struct Metrics<P> {
    upstream: P,
    name: String,
    tags: Arc<TagSet>,
    registry: Option<MeterRegistry>,
    percentiles: Option<Arc<Percentiles>>,
    clock: Arc<dyn Clock>,
}

impl<P: Publisher> Metrics<P> {
    /// Decorate `upstream`.
    ///
    /// Without a `registry`, subscriptions record into
    /// [`MeterRegistry::default_registry`], resolved when the first
    /// subscriber arrives. Construction itself records nothing.
    pub fn new(
        upstream: P,
        registry: Option<MeterRegistry>,
        percentiles: Option<Percentiles>,
    ) -> Self {
        let name = resolve_name(&upstream);
        let tags = resolve_tags(&upstream, &default_tags(upstream.arity()), &name);
        Self {
            upstream,
            name,
            tags: Arc::new(tags),
            registry,
            percentiles: percentiles.map(Arc::new),
            clock: Arc::new(SystemClock),
        }
    }

    /// Decorate `upstream` using percentiles and common tags from `config`.
    ///
    /// Common tags sit underneath the flow's own tags.
    pub fn from_config(
        upstream: P,
        registry: Option<MeterRegistry>,
        config: &MetricsConfig,
    ) -> Self {
        let mut decorated = Self::new(upstream, registry, config.percentiles.clone());
        if !config.common_tags.is_empty() {
            decorated.tags = Arc::new(config.common_tags.and_all(&decorated.tags));
        }
        decorated
    }

    /// Measure durations with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolved flow name.
    pub fn flow_name(&self) -> &str {
        &self.name
    }

    /// Tags attached to every series of this flow.
    pub fn flow_tags(&self) -> &TagSet {
        &self.tags
    }

    /// Configured percentiles, if any.
    pub fn percentiles(&self) -> Option<&Percentiles> {
        self.percentiles.as_deref()
    }

    /// The decorated publisher.
    pub fn upstream(&self) -> &P {
        &self.upstream
    }

    fn registry(&self) -> MeterRegistry {
        self.registry
            .clone()
            .unwrap_or_else(|| MeterRegistry::default_registry().clone())
    }
}

impl<P: Publisher> Publisher for Metrics<P> {
    type Item = P::Item;
    type Error = P::Error;

    fn subscribe(&self, actual: Arc<dyn Subscriber<Self::Item, Self::Error>>) {
        let registry = self.registry();
        let clock = Arc::clone(&self.clock);
        let tags = Arc::clone(&self.tags);
        let percentiles = self.percentiles.clone();

        let arity = self.upstream.arity();
        trace!(
            target: "flow_metrics.meter",
            flow = %self.name,
            arity = arity.as_str(),
            "Subscribing metered flow"
        );

        let subscriber: Arc<dyn Subscriber<Self::Item, Self::Error>> = match arity {
            Arity::Mono => {
                MonoMetricsSubscriber::new(actual, registry, clock, tags, percentiles)
            }
            Arity::Flux => FluxMetricsSubscriber::new(
                actual,
                registry,
                clock,
                tags,
                percentiles,
                self.name != DEFAULT_NAME,
            ),
        };
        self.upstream.subscribe(subscriber);
    }

    fn arity(&self) -> Arity {
        self.upstream.arity()
    }

    fn name(&self) -> Option<&str> {
        self.upstream.name()
    }

    fn tags(&self) -> TagSet {
        self.upstream.tags()
    }
}

/// Decorate `upstream` with metrics.
///
/// Shorthand for [`Metrics::new`].
pub fn decorate<P: Publisher>(
    upstream: P,
    registry: Option<MeterRegistry>,
    percentiles: Option<Percentiles>,
) -> Metrics<P> {
    Metrics::new(upstream, registry, percentiles)
}

/// Fluent naming, tagging and metering for any publisher.
pub trait PublisherExt: Publisher + Sized {
    /// Assign a name, used as the `flow` tag.
    fn named(self, name: impl Into<String>) -> Named<Self> {
        Named::new(self).named(name)
    }

    /// Attach a tag.
    fn tag(self, key: impl Into<String>, value: impl Into<String>) -> Named<Self> {
        Named::new(self).tag(key, value)
    }

    /// Meter into the default registry.
    fn metrics(self) -> Metrics<Self> {
        Metrics::new(self, None, None)
    }

    /// Meter into `registry`, optionally with percentiles.
    fn metrics_with(
        self,
        registry: MeterRegistry,
        percentiles: Option<Percentiles>,
    ) -> Metrics<Self> {
        Metrics::new(self, Some(registry), percentiles)
    }
}

impl<P: Publisher> PublisherExt for P {}
