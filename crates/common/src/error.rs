//! Common error types for flow-metrics components.

use thiserror::Error;

/// Common errors that can occur across flow-metrics components
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowMetricsError {
    /// Percentile outside of the open interval (0, 1)
    #[error("Invalid percentile: {0} (must be strictly between 0 and 1)")]
    InvalidPercentile(f64),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The process-wide default registry was already initialized
    #[error("Default meter registry already initialized")]
    DefaultRegistryAlreadySet,

    /// The process-wide dropped-signal hooks were already initialized
    #[error("Default hooks already initialized")]
    DefaultHooksAlreadySet,

    /// Installing the metrics exporter failed
    #[error("Exporter install error: {0}")]
    ExporterInstall(String),
}

/// Result type alias using `FlowMetricsError`
pub type Result<T> = std::result::Result<T, FlowMetricsError>;
