//! # Flow Test Utilities
//!
//! Shared test utilities for flow-metrics.
//!
//! This crate provides:
//! - An in-memory metrics harness (`MetricsHarness`) with label-aware queries
//! - A recording consumer (`RecordingSubscriber`) that logs every signal
//! - A scriptable upstream (`TestPublisher`) able to emit arbitrary, including
//!   protocol-violating, signal sequences
//! - Dropped-signal capture (`CapturingHooks`)
//! - Test logging setup (`init_test_tracing`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flow_metrics::prelude::*;
//! use flow_test_utils::*;
//!
//! #[test]
//! fn test_example() {
//!     let harness = MetricsHarness::new();
//!     let upstream = Arc::new(TestPublisher::<u32, TestError>::mono());
//!     let consumer = Arc::new(RecordingSubscriber::new());
//!
//!     decorate(upstream.clone(), Some(harness.registry()), None)
//!         .subscribe(consumer.clone());
//!     upstream.complete();
//!
//!     let snapshot = harness.snapshot();
//!     assert_eq!(snapshot.counter("reactor_subscribed_total", &[]), 1);
//! }
//! ```

pub mod harness;
pub mod hooks;
pub mod publisher;
pub mod subscriber;
pub mod tracing_setup;

// Re-export commonly used items
pub use harness::*;
pub use hooks::*;
pub use publisher::*;
pub use subscriber::*;
pub use tracing_setup::*;

/// Error type used by test flows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("test error: {0}")]
pub struct TestError(pub String);

impl TestError {
    /// Create an error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
