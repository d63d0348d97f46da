//! Signal-level metrics for reactive publishers.
//!
//! A [`decorator::Metrics`] wraps an upstream [`protocol::Publisher`] and
//! installs a metrics subscriber in front of every consumer. The subscriber
//! times the flow from subscription to its terminal signal, counts
//! subscriptions, cancellations and malformed (post-terminal) signals, and
//! otherwise forwards every signal untouched.
//!
//! ```rust,ignore
//! use flow_metrics::prelude::*;
//!
//! let checkout = sources::just(42u32).named("checkout").metrics();
//! checkout.subscribe(consumer);
//! ```

#![warn(clippy::pedantic)]

pub mod clock;
pub mod decorator;
pub mod flux;
pub mod meter;
pub mod mono;
pub mod naming;
pub mod observability;
pub mod protocol;
pub mod registry;
pub mod sources;

pub use common::types::{Percentiles, TagSet};
pub use decorator::{decorate, Metrics};

/// Commonly used traits and types.
pub mod prelude {
    pub use crate::clock::{Clock, MockClock, SystemClock};
    pub use crate::decorator::{decorate, Metrics, PublisherExt};
    pub use crate::protocol::{Arity, Publisher, Subscriber, Subscription};
    pub use crate::registry::MeterRegistry;
    pub use crate::sources;
    pub use common::types::{Percentiles, TagSet};
}
