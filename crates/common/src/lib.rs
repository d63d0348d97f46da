//! Common utilities and types shared across flow-metrics components.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for common data types (tag sets, percentiles)
pub mod types;

/// Module for common configuration
pub mod config;
