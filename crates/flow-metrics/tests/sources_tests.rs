//! Metered built-in sources, including the Tokio-backed future source.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use flow_metrics::observability::metrics::{
    METER_FLOW_DURATION, METER_MALFORMED, METER_SUBSCRIBED, STATUS_CANCELLED, STATUS_COMPLETED,
    STATUS_ERROR, TAG_STATUS,
};
use flow_metrics::prelude::*;
use flow_test_utils::{init_test_tracing, MetricsHarness, RecordingSubscriber, Signal, TestError};
use std::sync::Arc;
use std::time::Duration;

type Consumer = Arc<RecordingSubscriber<u32, TestError>>;

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn test_metered_just_delivers_value_then_counts_source_completion() {
    let harness = MetricsHarness::new();
    let consumer: Consumer = Arc::new(RecordingSubscriber::new().requesting(1));

    sources::just::<u32, TestError>(42)
        .metrics_with(harness.registry(), None)
        .subscribe(consumer.clone());

    assert_eq!(
        consumer.signals(),
        vec![Signal::Subscribe, Signal::Next(42), Signal::Complete]
    );

    // The source's completion after its value is post-terminal for a one-shot flow
    let snapshot = harness.snapshot();
    assert_eq!(
        snapshot.histogram_count(METER_FLOW_DURATION, &[(TAG_STATUS, STATUS_COMPLETED)]),
        1
    );
    assert_eq!(snapshot.counter(METER_MALFORMED, &[]), 1);
}

#[test]
fn test_metered_empty_and_error() {
    let harness = MetricsHarness::new();

    let completes: Consumer = Arc::new(RecordingSubscriber::new());
    sources::empty::<u32, TestError>()
        .named("empty")
        .metrics_with(harness.registry(), None)
        .subscribe(completes.clone());

    let fails: Consumer = Arc::new(RecordingSubscriber::new());
    sources::error::<u32, TestError>(TestError::new("refused"))
        .named("failing")
        .metrics_with(harness.registry(), None)
        .subscribe(fails.clone());

    assert_eq!(completes.completions(), 1);
    assert_eq!(fails.errors(), vec![TestError::new("refused")]);

    let snapshot = harness.snapshot();
    assert_eq!(
        snapshot.histogram_count(
            METER_FLOW_DURATION,
            &[("flow", "empty"), (TAG_STATUS, STATUS_COMPLETED)]
        ),
        1
    );
    assert_eq!(
        snapshot.histogram_count(
            METER_FLOW_DURATION,
            &[("flow", "failing"), (TAG_STATUS, STATUS_ERROR)]
        ),
        1
    );
    assert_eq!(snapshot.counter(METER_MALFORMED, &[]), 0);
}

#[tokio::test]
async fn test_metered_future_completes() {
    init_test_tracing();
    let harness = MetricsHarness::new();
    let consumer: Consumer = Arc::new(RecordingSubscriber::new().requesting(1));

    sources::from_future(|| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<u32, TestError>(3)
    })
    .named("lookup")
    .metrics_with(harness.registry(), None)
    .subscribe(consumer.clone());

    assert!(consumer.await_terminal(WAIT).await);
    assert_eq!(consumer.values(), vec![3]);
    assert_eq!(consumer.completions(), 1);

    let snapshot = harness.snapshot();
    assert_eq!(snapshot.counter(METER_SUBSCRIBED, &[("flow", "lookup")]), 1);
    let durations =
        snapshot.histogram(METER_FLOW_DURATION, &[(TAG_STATUS, STATUS_COMPLETED)]);
    assert_eq!(durations.len(), 1);
    assert!(durations[0] >= 0.005);
}

#[tokio::test]
async fn test_metered_future_error_is_delivered_without_demand() {
    let harness = MetricsHarness::new();
    let consumer: Consumer = Arc::new(RecordingSubscriber::new());

    sources::from_future(|| async { Err::<u32, TestError>(TestError::new("timeout")) })
        .metrics_with(harness.registry(), None)
        .subscribe(consumer.clone());

    assert!(consumer.await_terminal(WAIT).await);
    assert_eq!(consumer.errors(), vec![TestError::new("timeout")]);
    assert_eq!(
        harness
            .snapshot()
            .histogram_count(METER_FLOW_DURATION, &[(TAG_STATUS, STATUS_ERROR)]),
        1
    );
}

#[tokio::test]
async fn test_cancelled_future_never_delivers() {
    let harness = MetricsHarness::new();
    let consumer: Consumer = Arc::new(RecordingSubscriber::new());

    sources::from_future(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<u32, TestError>(1)
    })
    .metrics_with(harness.registry(), None)
    .subscribe(consumer.clone());

    consumer.cancel();
    consumer.request(1);

    assert!(!consumer.await_terminal(Duration::from_millis(50)).await);
    assert!(consumer.values().is_empty());
    assert_eq!(
        harness
            .snapshot()
            .histogram_count(METER_FLOW_DURATION, &[(TAG_STATUS, STATUS_CANCELLED)]),
        1
    );
}

/// Cancel racing the value: the consumer sees at most one terminal and the
/// cancel is always measured, whichever side wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_completion() {
    init_test_tracing();
    for _ in 0..50 {
        let harness = MetricsHarness::new();
        let consumer: Consumer = Arc::new(RecordingSubscriber::new());

        sources::from_future(|| async {
            tokio::task::yield_now().await;
            Ok::<u32, TestError>(9)
        })
        .metrics_with(harness.registry(), None)
        .subscribe(consumer.clone());

        let requester = {
            let consumer = consumer.clone();
            tokio::spawn(async move { consumer.request(1) })
        };
        let canceller = {
            let consumer = consumer.clone();
            tokio::spawn(async move { consumer.cancel() })
        };
        requester.await.unwrap();
        canceller.await.unwrap();

        // Give a winning value time to arrive
        consumer.await_terminal(Duration::from_millis(20)).await;

        assert!(consumer.terminal_count() <= 1);
        assert!(consumer.values().len() <= 1);
        assert_eq!(consumer.values().len(), consumer.completions());

        let snapshot = harness.snapshot();
        assert_eq!(
            snapshot.histogram_count(METER_FLOW_DURATION, &[(TAG_STATUS, STATUS_CANCELLED)]),
            1
        );
        assert!(
            snapshot.histogram_count(METER_FLOW_DURATION, &[(TAG_STATUS, STATUS_COMPLETED)]) <= 1
        );
    }
}
