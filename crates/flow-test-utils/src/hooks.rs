//! Dropped-signal capture

use flow_metrics::protocol::{DroppedSignalHandler, Hooks};
use std::any::Any;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// [`DroppedSignalHandler`] that keeps everything it receives.
#[derive(Default)]
pub struct CapturingHooks {
    values: Mutex<Vec<(Box<dyn Any + Send>, &'static str)>>,
    errors: Mutex<Vec<String>>,
}

impl CapturingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hooks handle delivering into this capture
    pub fn hooks(self: &Arc<Self>) -> Hooks {
        Hooks::from_arc(self.clone())
    }

    /// Dropped values of type `T`, in arrival order
    pub fn dropped_values<T: Clone + 'static>(&self) -> Vec<T> {
        self.values
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(value, _)| value.downcast_ref::<T>().cloned())
            .collect()
    }

    /// Type names of every dropped value
    pub fn dropped_value_types(&self) -> Vec<&'static str> {
        self.values
            .lock()
            .unwrap()
            .iter()
            .map(|(_, type_name)| *type_name)
            .collect()
    }

    /// Display strings of every dropped error
    pub fn dropped_errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl DroppedSignalHandler for CapturingHooks {
    fn on_next_dropped(&self, value: Box<dyn Any + Send>, type_name: &'static str) {
        self.values.lock().unwrap().push((value, type_name));
    }

    fn on_error_dropped(&self, error: Box<dyn Error + Send + Sync>) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}
