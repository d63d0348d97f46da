//! Recording consumer
//!
//! `RecordingSubscriber` stands in for the downstream consumer of a metered
//! flow: it logs every signal in arrival order and exposes the subscription
//! it received so tests can drive `request` / `cancel`.

use flow_metrics::protocol::{Hooks, Subscriber, Subscription};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A signal observed by a [`RecordingSubscriber`].
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T, E> {
    Subscribe,
    Next(T),
    Error(E),
    Complete,
}

impl<T, E> Signal<T, E> {
    /// Whether this is `Error` or `Complete`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Signal::Error(_) | Signal::Complete)
    }
}

/// Consumer logging every signal it receives.
pub struct RecordingSubscriber<T, E> {
    signals: Mutex<Vec<Signal<T, E>>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
    initial_request: Option<i64>,
    cancel_on_subscribe: bool,
    hooks: Option<Hooks>,
}

impl<T, E> RecordingSubscriber<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Consumer that requests nothing on its own
    pub fn new() -> Self {
        Self {
            signals: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
            initial_request: None,
            cancel_on_subscribe: false,
            hooks: None,
        }
    }

    /// Request `n` as soon as the subscription arrives
    pub fn requesting(mut self, n: i64) -> Self {
        self.initial_request = Some(n);
        self
    }

    /// Cancel as soon as the subscription arrives
    pub fn cancelling_on_subscribe(mut self) -> Self {
        self.cancel_on_subscribe = true;
        self
    }

    /// Report dropped signals to `hooks` instead of the global hooks
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Every signal received so far
    pub fn signals(&self) -> Vec<Signal<T, E>> {
        self.signals.lock().unwrap().clone()
    }

    /// Values received so far
    pub fn values(&self) -> Vec<T> {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Signal::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Errors received so far
    pub fn errors(&self) -> Vec<E> {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Signal::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of `on_complete` calls received
    pub fn completions(&self) -> usize {
        self.count(|s| matches!(s, Signal::Complete))
    }

    /// Number of terminal signals received
    pub fn terminal_count(&self) -> usize {
        self.count(Signal::is_terminal)
    }

    /// Number of `on_subscribe` calls received
    pub fn subscribe_count(&self) -> usize {
        self.count(|s| matches!(s, Signal::Subscribe))
    }

    /// The subscription handed to this consumer
    pub fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.subscription.lock().unwrap().clone()
    }

    /// Request through the received subscription
    ///
    /// # Panics
    ///
    /// Panics if no subscription was received.
    pub fn request(&self, n: i64) {
        self.subscription()
            .expect("request before on_subscribe")
            .request(n);
    }

    /// Cancel through the received subscription
    ///
    /// # Panics
    ///
    /// Panics if no subscription was received.
    pub fn cancel(&self) {
        self.subscription()
            .expect("cancel before on_subscribe")
            .cancel();
    }

    /// Wait until a terminal signal arrives or `timeout` elapses.
    ///
    /// Returns `true` if the flow terminated.
    pub async fn await_terminal(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.terminal_count() > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        self.terminal_count() > 0
    }

    fn count(&self, predicate: impl Fn(&Signal<T, E>) -> bool) -> usize {
        self.signals
            .lock()
            .unwrap()
            .iter()
            .filter(|s| predicate(s))
            .count()
    }

    fn push(&self, signal: Signal<T, E>) {
        self.signals.lock().unwrap().push(signal);
    }
}

impl<T, E> Default for RecordingSubscriber<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Subscriber<T, E> for RecordingSubscriber<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock().unwrap() = Some(subscription.clone());
        self.push(Signal::Subscribe);
        if self.cancel_on_subscribe {
            subscription.cancel();
        } else if let Some(n) = self.initial_request {
            subscription.request(n);
        }
    }

    fn on_next(&self, value: T) {
        self.push(Signal::Next(value));
    }

    fn on_error(&self, error: E) {
        self.push(Signal::Error(error));
    }

    fn on_complete(&self) {
        self.push(Signal::Complete);
    }

    fn hooks(&self) -> Hooks {
        self.hooks
            .clone()
            .unwrap_or_else(|| Hooks::global().clone())
    }
}
