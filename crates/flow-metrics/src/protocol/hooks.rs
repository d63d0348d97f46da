//! Dropped-signal hooks.
//!
//! Signals that cannot be delivered without breaking the protocol (a value or
//! error arriving after the terminal signal, a bad request, a duplicate
//! subscription) are handed to a [`DroppedSignalHandler`] instead of being
//! silently discarded. The default handler logs them.

use common::error::FlowMetricsError;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Process-wide hooks, initialized on first use.
static GLOBAL_HOOKS: OnceLock<Hooks> = OnceLock::new();

/// Receives signals a subscriber chain had to drop.
pub trait DroppedSignalHandler: Send + Sync {
    /// A value delivered after termination. `type_name` names the value's type.
    fn on_next_dropped(&self, value: Box<dyn Any + Send>, type_name: &'static str);

    /// An error that could not be delivered downstream.
    fn on_error_dropped(&self, error: Box<dyn Error + Send + Sync>);
}

/// Default handler: logs every dropped signal at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl DroppedSignalHandler for LoggingHandler {
    fn on_next_dropped(&self, _value: Box<dyn Any + Send>, type_name: &'static str) {
        warn!(
            target: "flow_metrics.hooks",
            value_type = type_name,
            "Value dropped after terminal signal"
        );
    }

    fn on_error_dropped(&self, error: Box<dyn Error + Send + Sync>) {
        warn!(
            target: "flow_metrics.hooks",
            error = %error,
            "Error dropped, downstream already terminated or signal invalid"
        );
    }
}

/// Cheaply clonable handle to a [`DroppedSignalHandler`].
#[derive(Clone)]
pub struct Hooks {
    handler: Arc<dyn DroppedSignalHandler>,
}

impl Hooks {
    /// Wrap a handler.
    pub fn new(handler: impl DroppedSignalHandler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Wrap an already shared handler.
    #[must_use]
    pub fn from_arc(handler: Arc<dyn DroppedSignalHandler>) -> Self {
        Self { handler }
    }

    /// Process-wide hooks. Logs dropped signals unless
    /// [`Hooks::install_global`] ran first.
    pub fn global() -> &'static Hooks {
        GLOBAL_HOOKS.get_or_init(|| {
            debug!(target: "flow_metrics.hooks", "Initializing default logging hooks");
            Hooks::new(LoggingHandler)
        })
    }

    /// Replace the process-wide hooks before first use.
    ///
    /// # Errors
    ///
    /// Returns `FlowMetricsError::DefaultHooksAlreadySet` if [`Hooks::global`]
    /// was already initialized.
    pub fn install_global(hooks: Hooks) -> Result<(), FlowMetricsError> {
        GLOBAL_HOOKS
            .set(hooks)
            .map_err(|_| FlowMetricsError::DefaultHooksAlreadySet)
    }

    /// Hand a dropped value to the handler.
    pub fn on_next_dropped<T: Send + 'static>(&self, value: T) {
        self.handler
            .on_next_dropped(Box::new(value), std::any::type_name::<T>());
    }

    /// Hand a dropped error to the handler.
    pub fn on_error_dropped<E: Error + Send + Sync + 'static>(&self, error: E) {
        self.handler.on_error_dropped(Box::new(error));
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        values: Mutex<Vec<&'static str>>,
        errors: Mutex<Vec<String>>,
    }

    impl DroppedSignalHandler for Collect {
        fn on_next_dropped(&self, value: Box<dyn Any + Send>, type_name: &'static str) {
            assert_eq!(value.downcast_ref::<u32>(), Some(&7));
            self.values.lock().unwrap().push(type_name);
        }

        fn on_error_dropped(&self, error: Box<dyn Error + Send + Sync>) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    #[test]
    fn test_hooks_route_to_handler() {
        let collect = Arc::new(Collect::default());
        let hooks = Hooks::from_arc(collect.clone());

        hooks.on_next_dropped(7u32);
        hooks.on_error_dropped(std::io::Error::other("late failure"));

        assert_eq!(*collect.values.lock().unwrap(), vec!["u32"]);
        assert_eq!(*collect.errors.lock().unwrap(), vec!["late failure"]);
    }

    #[test]
    fn test_logging_handler_accepts_signals() {
        let hooks = Hooks::new(LoggingHandler);
        hooks.on_next_dropped("late");
        hooks.on_error_dropped(std::io::Error::other("late"));
    }
}
