//! Validation shared by every operator in the protocol layer.

use super::hooks::Hooks;
use super::Subscription;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

/// Protocol violations detected while validating signals.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `on_subscribe` called on a subscriber that already holds a subscription.
    #[error("on_subscribe called more than once (reactive streams rule 2.12)")]
    DuplicateSubscription,

    /// `request(n)` with `n <= 0`.
    #[error("request amount must be positive but it was {0} (reactive streams rule 3.9)")]
    NonPositiveRequest(i64),
}

/// Store `next` into `current` if it is empty.
///
/// Returns `true` when `next` was accepted. A redundant subscription is
/// cancelled and reported to the dropped-error hook; `current` is left
/// untouched.
pub fn validate_subscription(
    current: &OnceLock<Arc<dyn Subscription>>,
    next: Arc<dyn Subscription>,
    hooks: &Hooks,
) -> bool {
    match current.set(next) {
        Ok(()) => true,
        Err(rejected) => {
            debug!(
                target: "flow_metrics.validate",
                "Rejecting duplicate subscription"
            );
            rejected.cancel();
            hooks.on_error_dropped(ProtocolError::DuplicateSubscription);
            false
        }
    }
}

/// Returns `true` if `n` is a valid request amount; otherwise reports
/// `ProtocolError::NonPositiveRequest` to the dropped-error hook.
pub fn validate_request(n: i64, hooks: &Hooks) -> bool {
    if n > 0 {
        return true;
    }
    debug!(
        target: "flow_metrics.validate",
        requested = n,
        "Rejecting non-positive request"
    );
    hooks.on_error_dropped(ProtocolError::NonPositiveRequest(n));
    false
}
