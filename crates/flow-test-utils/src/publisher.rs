//! Scriptable upstream
//!
//! `TestPublisher` hands its subscriber a [`TestSubscription`] and then lets
//! the test push signals into that subscriber directly, including sequences
//! a well-behaved source would never produce (values after completion,
//! duplicate `on_subscribe`, double terminals).

use flow_metrics::protocol::{Arity, Publisher, Subscriber, Subscription};
use flow_metrics::TagSet;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Subscription recording what was asked of it.
#[derive(Debug, Default)]
pub struct TestSubscription {
    requests: Mutex<Vec<i64>>,
    cancels: AtomicUsize,
}

impl TestSubscription {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `request(n)` received, in order
    pub fn requests(&self) -> Vec<i64> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of `cancel()` calls received
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_count() > 0
    }
}

impl Subscription for TestSubscription {
    fn request(&self, n: i64) {
        self.requests.lock().unwrap().push(n);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Publisher driven by the test.
pub struct TestPublisher<T, E> {
    arity: Arity,
    name: Option<String>,
    tags: TagSet,
    auto_subscribe: bool,
    subscription: Arc<TestSubscription>,
    subscribers: Mutex<Vec<Arc<dyn Subscriber<T, E>>>>,
}

impl<T, E> TestPublisher<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    fn with_arity(arity: Arity) -> Self {
        Self {
            arity,
            name: None,
            tags: TagSet::new(),
            auto_subscribe: true,
            subscription: TestSubscription::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// One-shot publisher
    pub fn mono() -> Self {
        Self::with_arity(Arity::Mono)
    }

    /// Multi-value publisher
    pub fn flux() -> Self {
        Self::with_arity(Arity::Flux)
    }

    /// Report `name` as the publisher name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Report an additional tag
    pub fn tagged(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags = self.tags.and(key, value);
        self
    }

    /// Do not call `on_subscribe` on subscribe; use [`Self::emit_subscribe`]
    pub fn manual_subscribe(mut self) -> Self {
        self.auto_subscribe = false;
        self
    }

    /// The subscription handed to subscribers
    pub fn subscription(&self) -> &Arc<TestSubscription> {
        &self.subscription
    }

    /// Number of subscribe calls received
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Latest subscriber
    ///
    /// # Panics
    ///
    /// Panics if nobody subscribed.
    pub fn subscriber(&self) -> Arc<dyn Subscriber<T, E>> {
        self.subscribers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no subscriber")
    }

    /// Deliver the shared subscription (again)
    pub fn emit_subscribe(&self) {
        self.subscriber().on_subscribe(self.subscription.clone());
    }

    /// Deliver a distinct subscription
    pub fn emit_subscribe_with(&self, subscription: Arc<dyn Subscription>) {
        self.subscriber().on_subscribe(subscription);
    }

    pub fn next(&self, value: T) {
        self.subscriber().on_next(value);
    }

    pub fn error(&self, error: E) {
        self.subscriber().on_error(error);
    }

    pub fn complete(&self) {
        self.subscriber().on_complete();
    }
}

impl<T, E> Publisher for TestPublisher<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) {
        self.subscribers.lock().unwrap().push(subscriber.clone());
        if self.auto_subscribe {
            subscriber.on_subscribe(self.subscription.clone());
        }
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn tags(&self) -> TagSet {
        self.tags.clone()
    }
}
