//! Metrics configuration.
//!
//! Configuration is loaded from environment variables. Nothing here is
//! required: an empty environment yields the default configuration
//! (no percentiles, no extra tags).

use crate::types::{Percentiles, TagSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Environment variable holding comma-separated percentiles.
pub const ENV_PERCENTILES: &str = "FLOW_METRICS_PERCENTILES";

/// Environment variable holding `key=value` tags added to every series.
pub const ENV_COMMON_TAGS: &str = "FLOW_METRICS_COMMON_TAGS";

/// Metrics configuration shared by decorators and the exporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Percentiles published for flow duration timers (default: none).
    pub percentiles: Option<Percentiles>,

    /// Tags appended to every series, below the flow's own tags.
    #[serde(default)]
    pub common_tags: TagSet,
}

/// Errors raised while loading [`MetricsConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was present but could not be parsed.
    #[error("Invalid configuration value for {name}: {reason}")]
    InvalidValue {
        /// Name of the offending variable.
        name: String,
        /// Parser message.
        reason: String,
    },
}

impl MetricsConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is present but malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let percentiles = vars
            .get(ENV_PERCENTILES)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                raw.parse::<Percentiles>()
                    .map_err(|e| ConfigError::InvalidValue {
                        name: ENV_PERCENTILES.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        let common_tags = vars
            .get(ENV_COMMON_TAGS)
            .map(|raw| {
                raw.parse::<TagSet>().map_err(|e| ConfigError::InvalidValue {
                    name: ENV_COMMON_TAGS.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or_default();

        tracing::debug!(
            target: "flow_metrics.config",
            percentiles = ?percentiles.as_ref().map(Percentiles::as_slice),
            common_tags = common_tags.len(),
            "Loaded metrics configuration"
        );

        Ok(MetricsConfig {
            percentiles,
            common_tags,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = MetricsConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, MetricsConfig::default());
    }

    #[test]
    fn test_percentiles_and_tags_are_parsed() {
        let config = MetricsConfig::from_vars(&vars(&[
            (ENV_PERCENTILES, "0.5,0.95,0.99"),
            (ENV_COMMON_TAGS, "service=checkout,region=eu"),
        ]))
        .unwrap();

        assert_eq!(
            config.percentiles.unwrap().as_slice(),
            &[0.5, 0.95, 0.99]
        );
        assert_eq!(config.common_tags.get("service"), Some("checkout"));
        assert_eq!(config.common_tags.get("region"), Some("eu"));
    }

    #[test]
    fn test_blank_percentiles_mean_none() {
        let config = MetricsConfig::from_vars(&vars(&[(ENV_PERCENTILES, "  ")])).unwrap();
        assert!(config.percentiles.is_none());
    }

    #[test]
    fn test_invalid_percentile_is_rejected() {
        let err = MetricsConfig::from_vars(&vars(&[(ENV_PERCENTILES, "0.5,2")])).unwrap_err();
        assert!(err.to_string().contains(ENV_PERCENTILES));
    }

    #[test]
    fn test_invalid_tag_is_rejected() {
        let result = MetricsConfig::from_vars(&vars(&[(ENV_COMMON_TAGS, "service")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref name, .. }) if name == ENV_COMMON_TAGS
        ));
    }
}
