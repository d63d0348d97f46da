//! Reactive-stream signal protocol.
//!
//! The contract every publisher and subscriber in this crate follows:
//!
//! - `on_subscribe` is delivered once, before any other signal.
//! - `on_next` is delivered at most as many times as requested.
//! - At most one of `on_complete` / `on_error` ends the sequence.
//! - `on_*` signals for one subscription are delivered serially, never
//!   concurrently or re-entrantly.
//! - `request` and `cancel` may be called from any thread, at any time.
//!
//! All methods take `&self`; implementations keep their state behind
//! atomics or write-once cells so the same object can act as both a
//! subscriber (upstream side) and a subscription (consumer side).

pub mod hooks;
pub mod validate;

use common::types::TagSet;
use std::sync::Arc;

pub use hooks::{DroppedSignalHandler, Hooks};
pub use validate::{validate_request, validate_subscription, ProtocolError};

/// Upper bound a publisher may emit: one value (`Mono`) or many (`Flux`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// At most one value followed by completion, or a single error.
    Mono,
    /// Any number of values followed by completion, or an error.
    Flux,
}

impl Arity {
    /// Returns the arity as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Arity::Mono => "Mono",
            Arity::Flux => "Flux",
        }
    }
}

/// Consumer-issued handle controlling demand and lifetime of a subscription.
pub trait Subscription: Send + Sync {
    /// Request up to `n` more values. `n` must be positive.
    fn request(&self, n: i64);

    /// Stop the flow. Further signals may still arrive while cancellation
    /// propagates.
    fn cancel(&self);
}

/// Receiver of the signals a publisher emits.
pub trait Subscriber<T, E>: Send + Sync {
    /// Called once with the subscription for this flow.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// A value.
    fn on_next(&self, value: T);

    /// Terminal failure.
    fn on_error(&self, error: E);

    /// Terminal success.
    fn on_complete(&self);

    /// Hooks receiving signals this subscriber's chain had to drop.
    fn hooks(&self) -> Hooks {
        Hooks::global().clone()
    }
}

/// A source of signals.
///
/// `name` and `tags` describe the publisher for metrics; they default to
/// anonymous and untagged (see [`crate::decorator::PublisherExt`] to set
/// them).
pub trait Publisher: Send + Sync {
    /// Value type.
    type Item: Send + 'static;
    /// Error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start a new flow delivering to `subscriber`.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<Self::Item, Self::Error>>);

    /// Whether this publisher emits at most one value.
    fn arity(&self) -> Arity {
        Arity::Flux
    }

    /// User-assigned name, if any.
    fn name(&self) -> Option<&str> {
        None
    }

    /// User-assigned tags.
    fn tags(&self) -> TagSet {
        TagSet::new()
    }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    type Item = P::Item;
    type Error = P::Error;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<Self::Item, Self::Error>>) {
        (**self).subscribe(subscriber);
    }

    fn arity(&self) -> Arity {
        (**self).arity()
    }

    fn name(&self) -> Option<&str> {
        (**self).name()
    }

    fn tags(&self) -> TagSet {
        (**self).tags()
    }
}

/// Subscription that ignores every call. Used by sources that terminate
/// immediately on subscribe.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
    fn request(&self, _n: i64) {}

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_labels() {
        assert_eq!(Arity::Mono.as_str(), "Mono");
        assert_eq!(Arity::Flux.as_str(), "Flux");
    }
}
