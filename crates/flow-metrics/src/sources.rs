//! Basic publishers.
//!
//! Minimal, demand-respecting sources used to build and test metered flows:
//! [`just`], [`empty`] and [`error`] are one-shot; [`from_future`] bridges a
//! Tokio future into a one-shot flow; [`from_iter`] emits a fixed sequence.

use crate::protocol::{
    validate_request, Arity, EmptySubscription, Hooks, Publisher, Subscriber, Subscription,
};
use std::collections::VecDeque;
use std::error::Error;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::trace;

// ---------------------------------------------------------------------------
// just / empty / error
// ---------------------------------------------------------------------------

/// One-shot publisher of a single value.
#[derive(Debug, Clone)]
pub struct Just<T, E> {
    value: T,
    _error: PhantomData<fn() -> E>,
}

/// Emit `value` once requested, then complete.
pub fn just<T, E>(value: T) -> Just<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Error + Send + Sync + 'static,
{
    Just {
        value,
        _error: PhantomData,
    }
}

impl<T, E> Publisher for Just<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) {
        let subscription = Arc::new(ScalarSubscription {
            state: Mutex::new(Some((Arc::clone(&subscriber), self.value.clone()))),
        });
        subscriber.on_subscribe(subscription);
    }

    fn arity(&self) -> Arity {
        Arity::Mono
    }
}

/// Holds the consumer and one value until the first valid request or a
/// cancel, whichever comes first.
struct ScalarSubscription<T, E> {
    state: Mutex<Option<(Arc<dyn Subscriber<T, E>>, T)>>,
}

impl<T, E> Subscription for ScalarSubscription<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn request(&self, n: i64) {
        let taken = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let Some((actual, _)) = state.as_ref() else {
                return;
            };
            if !validate_request(n, &actual.hooks()) {
                return;
            }
            state.take()
        };
        if let Some((actual, value)) = taken {
            actual.on_next(value);
            actual.on_complete();
        }
    }

    fn cancel(&self) {
        drop(
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }
}

/// One-shot publisher that completes without a value.
#[derive(Debug, Clone, Copy)]
pub struct Empty<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Complete immediately on subscribe.
pub fn empty<T, E>() -> Empty<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    Empty {
        _marker: PhantomData,
    }
}

impl<T, E> Publisher for Empty<T, E>
where
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) {
        subscriber.on_subscribe(Arc::new(EmptySubscription));
        subscriber.on_complete();
    }

    fn arity(&self) -> Arity {
        Arity::Mono
    }
}

/// One-shot publisher that fails every subscriber.
#[derive(Debug, Clone)]
pub struct Fail<T, E> {
    error: E,
    _item: PhantomData<fn() -> T>,
}

/// Signal `error` immediately on subscribe.
pub fn error<T, E>(error: E) -> Fail<T, E>
where
    T: Send + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    Fail {
        error,
        _item: PhantomData,
    }
}

impl<T, E> Publisher for Fail<T, E>
where
    T: Send + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) {
        subscriber.on_subscribe(Arc::new(EmptySubscription));
        subscriber.on_error(self.error.clone());
    }

    fn arity(&self) -> Arity {
        Arity::Mono
    }
}

// ---------------------------------------------------------------------------
// from_future
// ---------------------------------------------------------------------------

/// One-shot publisher backed by a future started per subscription.
pub struct FromFuture<F, T, E> {
    factory: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

/// Run the future produced by `factory` on the current Tokio runtime for
/// every subscriber.
///
/// The future starts on subscribe. A value is held until requested; an
/// error is delivered as soon as it resolves. Cancelling aborts the task.
///
/// # Panics
///
/// Subscribing outside a Tokio runtime panics, as [`tokio::spawn`] does.
pub fn from_future<F, Fut, T, E>(factory: F) -> FromFuture<F, T, E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    FromFuture {
        factory,
        _marker: PhantomData,
    }
}

impl<F, Fut, T, E> Publisher for FromFuture<F, T, E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) {
        let (demand_tx, demand_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let subscription = Arc::new(FutureSubscription {
            hooks: subscriber.hooks(),
            demand: Mutex::new(Some(demand_tx)),
            cancelled: Arc::clone(&cancelled),
            task: Mutex::new(None),
        });
        subscriber.on_subscribe(subscription.clone());

        if cancelled.load(Ordering::Acquire) {
            return;
        }

        let future = (self.factory)();
        let actual = subscriber;
        let handle = tokio::spawn(async move {
            match future.await {
                Ok(value) => {
                    // Sender dropped: the subscription was cancelled
                    if demand_rx.await.is_err() || cancelled.load(Ordering::Acquire) {
                        trace!(target: "flow_metrics.sources", "Future value discarded");
                        return;
                    }
                    actual.on_next(value);
                    actual.on_complete();
                }
                Err(error) => {
                    if !cancelled.load(Ordering::Acquire) {
                        actual.on_error(error);
                    }
                }
            }
        });
        subscription.attach(handle);
    }

    fn arity(&self) -> Arity {
        Arity::Mono
    }
}

struct FutureSubscription {
    hooks: Hooks,
    demand: Mutex<Option<oneshot::Sender<()>>>,
    cancelled: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FutureSubscription {
    fn attach(&self, handle: JoinHandle<()>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancelled.load(Ordering::Acquire) {
            handle.abort();
        } else {
            *task = Some(handle);
        }
    }
}

impl Subscription for FutureSubscription {
    fn request(&self, n: i64) {
        if !validate_request(n, &self.hooks) {
            return;
        }
        let sender = self
            .demand
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // Receiver gone: the task already finished or was aborted
            let _ = sender.send(());
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(
            self.demand
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// from_iter
// ---------------------------------------------------------------------------

/// Multi-value publisher replaying a fixed sequence to every subscriber.
#[derive(Debug, Clone)]
pub struct FromIter<T, E> {
    items: Vec<T>,
    _error: PhantomData<fn() -> E>,
}

/// Emit `items` in order as demand allows, then complete.
pub fn from_iter<T, E>(items: impl IntoIterator<Item = T>) -> FromIter<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Error + Send + Sync + 'static,
{
    FromIter {
        items: items.into_iter().collect(),
        _error: PhantomData,
    }
}

impl<T, E> Publisher for FromIter<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) {
        if self.items.is_empty() {
            subscriber.on_subscribe(Arc::new(EmptySubscription));
            subscriber.on_complete();
            return;
        }
        let subscription = Arc::new(IterSubscription {
            hooks: subscriber.hooks(),
            actual: Mutex::new(Some(Arc::clone(&subscriber))),
            items: Mutex::new(self.items.iter().cloned().collect()),
            requested: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(subscription);
    }
}

struct IterSubscription<T, E> {
    hooks: Hooks,
    /// Cleared on completion or cancel.
    actual: Mutex<Option<Arc<dyn Subscriber<T, E>>>>,
    items: Mutex<VecDeque<T>>,
    requested: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
}

impl<T, E> IterSubscription<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn actual(&self) -> Option<Arc<dyn Subscriber<T, E>>> {
        self.actual
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn release(&self) {
        drop(
            self.actual
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }

    /// Next item and whether it was the last one.
    fn poll(&self) -> (Option<T>, bool) {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let item = items.pop_front();
        (item, items.is_empty())
    }

    /// Emit while there is demand. Re-entrant calls only bump `wip`; the
    /// outermost caller loops until no work was missed.
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let Some(actual) = self.actual() else {
            return;
        };
        let mut missed = 1;
        loop {
            while self.requested.load(Ordering::Acquire) > 0 {
                if self.cancelled.load(Ordering::Acquire) {
                    return;
                }
                let (item, last) = self.poll();
                let Some(item) = item else {
                    return;
                };
                actual.on_next(item);
                if last {
                    if !self.cancelled.load(Ordering::Acquire) {
                        actual.on_complete();
                    }
                    self.release();
                    return;
                }
                self.requested.fetch_sub(1, Ordering::AcqRel);
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }
}

impl<T, E> Subscription for IterSubscription<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn request(&self, n: i64) {
        if !validate_request(n, &self.hooks) {
            return;
        }
        let n = n.unsigned_abs();
        // Saturates at u64::MAX, which is treated as unbounded demand
        let _ = self
            .requested
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            });
        self.drain();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.release();
    }
}
