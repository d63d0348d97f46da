//! Meter registry handle.
//!
//! A [`MeterRegistry`] points either at the process-wide `metrics` recorder
//! (whatever was installed with `metrics::set_global_recorder`, e.g. by
//! [`crate::observability::init_metrics_recorder`]) or at a specific
//! recorder owned by the caller. Handles are cheap to clone and shared by
//! every subscription of a decorated publisher.
//!
//! A registry also keeps one quantile sketch per duration series for flows
//! decorated with their own percentiles. Clones share the sketches.

use common::error::FlowMetricsError;
use common::types::Percentiles;
use metrics::{Key, Recorder};
use metrics_util::Summary;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, warn};

/// Process-wide default registry, initialized on first use.
static DEFAULT_REGISTRY: OnceLock<MeterRegistry> = OnceLock::new();

/// Handle to a metrics backend.
#[derive(Clone)]
pub struct MeterRegistry {
    backend: Backend,
    summaries: Arc<Mutex<HashMap<Key, Summary>>>,
}

#[derive(Clone)]
enum Backend {
    /// The recorder currently installed in the `metrics` facade.
    Process,
    /// A caller-owned recorder.
    Local(Arc<dyn Recorder + Send + Sync>),
}

impl MeterRegistry {
    /// Registry delegating to the `metrics` facade's installed recorder.
    #[must_use]
    pub fn process() -> Self {
        Self::with_backend(Backend::Process)
    }

    /// Registry owning `recorder`.
    pub fn from_recorder<R>(recorder: R) -> Self
    where
        R: Recorder + Send + Sync + 'static,
    {
        Self::from_arc(Arc::new(recorder))
    }

    /// Registry sharing an existing recorder.
    #[must_use]
    pub fn from_arc(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        Self::with_backend(Backend::Local(recorder))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            summaries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The process-wide default registry, used by decorators built without
    /// an explicit registry.
    ///
    /// Initialized lazily, exactly once, to [`MeterRegistry::process`] unless
    /// [`MeterRegistry::install_default`] ran first. Never torn down.
    pub fn default_registry() -> &'static MeterRegistry {
        DEFAULT_REGISTRY.get_or_init(|| {
            debug!(
                target: "flow_metrics.registry",
                "Initializing default meter registry from the process recorder"
            );
            MeterRegistry::process()
        })
    }

    /// Inject the process-wide default registry before its first use.
    ///
    /// # Errors
    ///
    /// Returns `FlowMetricsError::DefaultRegistryAlreadySet` if the default
    /// registry was already initialized or injected.
    pub fn install_default(registry: MeterRegistry) -> Result<(), FlowMetricsError> {
        DEFAULT_REGISTRY
            .set(registry)
            .map_err(|_| FlowMetricsError::DefaultRegistryAlreadySet)?;
        debug!(target: "flow_metrics.registry", "Default meter registry injected");
        Ok(())
    }

    /// Run `emission` against the backing recorder.
    ///
    /// A panic raised by the recorder is caught and logged; it never reaches
    /// the signal path that triggered the emission.
    pub fn emit(&self, operation: &'static str, emission: impl FnOnce(&dyn Recorder)) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &self.backend {
            Backend::Process => metrics::with_recorder(emission),
            Backend::Local(recorder) => emission(recorder.as_ref()),
        }));

        if outcome.is_err() {
            warn!(
                target: "flow_metrics.registry",
                operation,
                "Metrics recorder panicked, signal delivery continues"
            );
        }
    }

    /// Add `value` to the quantile sketch of `series` and return the current
    /// estimate for each of `percentiles`, in order.
    ///
    /// Quantiles with no estimate yet are skipped.
    pub fn observe_quantiles(
        &self,
        series: &Key,
        value: f64,
        percentiles: &Percentiles,
    ) -> Vec<(f64, f64)> {
        let mut summaries = self
            .summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let summary = summaries
            .entry(series.clone())
            .or_insert_with(Summary::with_defaults);
        summary.add(value);
        percentiles
            .as_slice()
            .iter()
            .filter_map(|&q| summary.quantile(q).map(|estimate| (q, estimate)))
            .collect()
    }
}

impl fmt::Debug for MeterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.backend {
            Backend::Process => "process",
            Backend::Local(_) => "local",
        };
        f.debug_struct("MeterRegistry")
            .field("backend", &backend)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

    use super::*;
    use metrics::{Counter, Gauge, Histogram, Key, KeyName, Level, Metadata, SharedString, Unit};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    static METADATA: Metadata<'static> =
        Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

    struct PanickingRecorder;

    impl Recorder for PanickingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            panic!("backend unavailable");
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            panic!("backend unavailable");
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            panic!("backend unavailable");
        }
    }

    #[test]
    fn test_local_registry_emits_to_its_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let registry = MeterRegistry::from_recorder(recorder);

        registry.emit("test", |r| {
            r.register_counter(&Key::from_name("test_total"), &METADATA)
                .increment(3);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(snapshot.len(), 1);
        let (key, _, _, value) = snapshot.into_iter().next().unwrap();
        assert_eq!(key.key().name(), "test_total");
        assert_eq!(value, DebugValue::Counter(3));
    }

    #[test]
    fn test_recorder_panic_is_isolated() {
        let registry = MeterRegistry::from_recorder(PanickingRecorder);

        // Must return normally instead of unwinding into the caller
        registry.emit("test", |r| {
            r.register_counter(&Key::from_name("test_total"), &METADATA)
                .increment(1);
        });
    }

    #[test]
    fn test_process_registry_without_recorder_is_noop() {
        // With no global recorder installed, the facade's no-op recorder is used
        MeterRegistry::process().emit("test", |r| {
            r.register_counter(&Key::from_name("test_total"), &METADATA)
                .increment(1);
        });
    }

    #[test]
    fn test_default_registry_is_initialized_once() {
        let first = MeterRegistry::default_registry();
        let second = MeterRegistry::default_registry();
        assert!(std::ptr::eq(first, second));
        assert_eq!(
            MeterRegistry::install_default(MeterRegistry::process()).unwrap_err(),
            FlowMetricsError::DefaultRegistryAlreadySet
        );
    }

    #[test]
    fn test_quantiles_are_tracked_per_series() {
        let registry = MeterRegistry::from_recorder(DebuggingRecorder::new());
        let percentiles = Percentiles::new(vec![0.5]).unwrap();
        let fast = Key::from_name("fast");
        let slow = Key::from_name("slow");

        registry.observe_quantiles(&fast, 0.01, &percentiles);
        let shared = registry.clone();
        shared.observe_quantiles(&slow, 5.0, &percentiles);
        let estimates = registry.observe_quantiles(&fast, 0.01, &percentiles);

        assert_eq!(estimates.len(), 1);
        let (quantile, estimate) = estimates[0];
        assert_eq!(quantile, 0.5);
        assert!((estimate - 0.01).abs() < 1e-5, "estimate was {estimate}");
    }

    #[test]
    fn test_debug_hides_recorder() {
        let registry = MeterRegistry::from_recorder(DebuggingRecorder::new());
        assert_eq!(
            format!("{registry:?}"),
            "MeterRegistry { backend: \"local\" }"
        );
    }
}
