//! Common data types for flow-metrics components.

use crate::error::FlowMetricsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Immutable key/value metadata identifying one metric series.
///
/// Keys are kept sorted so two tag sets with the same content always render
/// the same label order. Combining operations return a new set; a later value
/// for an existing key replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Create an empty tag set
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Create a tag set holding a single tag
    #[must_use]
    pub fn of(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().and(key, value)
    }

    /// Return a copy of this set with `key` set to `value`
    #[must_use]
    pub fn and(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut tags = self.0.clone();
        tags.insert(key.into(), value.into());
        Self(tags)
    }

    /// Return a copy of this set merged with `other`; `other` wins on conflicts
    #[must_use]
    pub fn and_all(&self, other: &TagSet) -> Self {
        let mut tags = self.0.clone();
        tags.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(tags)
    }

    /// Look up the value for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate over `(key, value)` pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of tags
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no tags
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for TagSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parses `key=value` pairs separated by commas, e.g. `region=eu,tier=gold`.
impl FromStr for TagSet {
    type Err = FlowMetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    Ok((k.trim().to_string(), v.trim().to_string()))
                }
                _ => Err(FlowMetricsError::Configuration(format!(
                    "invalid tag '{pair}', expected key=value"
                ))),
            })
            .collect()
    }
}

/// Ordered percentile configuration for flow duration timers.
///
/// Every value is finite and strictly inside (0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Percentiles(Vec<f64>);

impl Percentiles {
    /// Validate and wrap a list of percentiles.
    ///
    /// # Errors
    ///
    /// Returns `FlowMetricsError::InvalidPercentile` for the first value that is
    /// not finite or not strictly between 0 and 1.
    pub fn new(values: Vec<f64>) -> Result<Self, FlowMetricsError> {
        if let Some(bad) = values
            .iter()
            .copied()
            .find(|p| !p.is_finite() || *p <= 0.0 || *p >= 1.0)
        {
            return Err(FlowMetricsError::InvalidPercentile(bad));
        }
        Ok(Self(values))
    }

    /// The percentiles in configured order
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of configured percentiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no percentile is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for Percentiles {
    type Error = FlowMetricsError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Percentiles> for Vec<f64> {
    fn from(percentiles: Percentiles) -> Self {
        percentiles.0
    }
}

/// Parses a comma-separated list, e.g. `0.5,0.95,0.99`.
impl FromStr for Percentiles {
    type Err = FlowMetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>().map_err(|e| {
                    FlowMetricsError::Configuration(format!("invalid percentile '{v}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values)
    }
}
