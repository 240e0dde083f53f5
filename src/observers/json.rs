//! JSON observer for serializing query counts.
//!
//! This module provides [`JsonObserver`], which evaluates a list of
//! [`Query`] values against a registry and serializes the counts to JSON
//! using serde.
//!
//! # Feature Flag
//!
//! This module requires the `json` feature:
//!
//! ```toml
//! [dependencies]
//! hmsketch = { version = "0.1", features = ["json"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use hmsketch::{Query, Registry};
//! use hmsketch::observers::json::JsonObserver;
//!
//! let registry = Registry::new(2);
//! registry.insert([("method", "GET")], 12.0, 1000.0);
//!
//! let queries = [Query::new("gets").with_label("method", "GET")];
//! let json = JsonObserver::new().to_json(&registry, queries.iter())?;
//!
//! println!("{}", json);
//! // [{"name":"gets","labels":{"method":"GET"},"count":1000.0}]
//! ```

use std::collections::BTreeMap;

use crate::histogram::Histogram;
use crate::observers::evaluate;
use crate::query::Query;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};

/// The count of a single query at the time it was evaluated.
///
/// Labels are stored in a sorted map so the JSON output does not depend on
/// the order in which the query's labels were declared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuerySnapshot {
    /// The name of the query.
    pub name: String,
    /// The query's `key=value` labels.
    pub labels: BTreeMap<String, String>,
    /// Approximate number of matching observations.
    pub count: f64,
}

/// A point-in-time report over one registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryReport {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    /// Name of the registry, empty if unnamed.
    pub registry: String,
    /// Total mass of the global histogram.
    pub total_count: f64,
    /// Number of allocated slots, global included.
    pub slot_count: usize,
    /// One entry per evaluated query.
    pub queries: Vec<QuerySnapshot>,
}

impl RegistryReport {
    /// Finds a query result by name.
    pub fn get(&self, name: &str) -> Option<&QuerySnapshot> {
        self.queries.iter().find(|q| q.name == name)
    }
}

/// Configuration for the JSON observer.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    /// Whether to pretty-print the JSON output.
    pub pretty: bool,
    /// Whether to include a timestamp in the output.
    pub include_timestamp: bool,
    /// Whether to wrap the query results in a [`RegistryReport`].
    pub wrap_in_report: bool,
}

/// An observer that serializes query counts to JSON.
///
/// Without wrapping the output is a bare array of [`QuerySnapshot`]. With
/// [`wrap_in_report`](Self::wrap_in_report) enabled, the array is embedded
/// in a [`RegistryReport`] carrying registry-wide figures.
#[derive(Debug, Clone, Default)]
pub struct JsonObserver {
    config: JsonConfig,
}

impl JsonObserver {
    /// Creates a new JSON observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new JSON observer with the specified configuration.
    pub fn with_config(config: JsonConfig) -> Self {
        Self { config }
    }

    /// Enables or disables pretty-printing.
    pub fn pretty(mut self, enabled: bool) -> Self {
        self.config.pretty = enabled;
        self
    }

    /// Enables or disables timestamp inclusion.
    ///
    /// Only has effect when `wrap_in_report` is also enabled.
    pub fn include_timestamp(mut self, enabled: bool) -> Self {
        self.config.include_timestamp = enabled;
        self
    }

    /// Enables or disables wrapping the output in a [`RegistryReport`].
    pub fn wrap_in_report(mut self, enabled: bool) -> Self {
        self.config.wrap_in_report = enabled;
        self
    }

    /// Evaluates the queries into [`QuerySnapshot`] values.
    pub fn collect<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> Vec<QuerySnapshot> {
        evaluate(registry, queries)
            .into_iter()
            .map(|result| QuerySnapshot {
                name: result.name,
                labels: result.labels.into_iter().collect(),
                count: result.count,
            })
            .collect()
    }

    /// Builds a [`RegistryReport`] regardless of the wrapping setting.
    pub fn report<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> RegistryReport {
        RegistryReport {
            timestamp_ms: self.config.include_timestamp.then(current_timestamp_ms),
            registry: registry.name().to_string(),
            total_count: registry.total_count(),
            slot_count: registry.slot_count(),
            queries: self.collect(registry, queries),
        }
    }

    /// Serializes the query counts to a JSON string.
    pub fn to_json<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> Result<String, serde_json::Error> {
        if self.config.wrap_in_report {
            let report = self.report(registry, queries);
            if self.config.pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            }
        } else {
            let snapshots = self.collect(registry, queries);
            if self.config.pretty {
                serde_json::to_string_pretty(&snapshots)
            } else {
                serde_json::to_string(&snapshots)
            }
        }
    }

    /// Serializes the query counts to a JSON byte vector.
    pub fn to_json_bytes<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> Result<Vec<u8>, serde_json::Error> {
        if self.config.wrap_in_report {
            serde_json::to_vec(&self.report(registry, queries))
        } else {
            serde_json::to_vec(&self.collect(registry, queries))
        }
    }
}

/// Returns the current timestamp in milliseconds since Unix epoch.
fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let registry = Registry::new(2).with_name("http_latency");
        registry.insert([("method", "GET"), ("status", "200")], 12.0, 1000.0);
        registry.insert([("method", "POST"), ("status", "500")], 40.0, 5.0);
        registry
    }

    #[test]
    fn test_to_json_empty() {
        let json = JsonObserver::new().to_json(&registry(), [].iter()).unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn test_to_json_single_query() {
        let queries = [Query::new("gets").with_label("method", "GET")];
        let json = JsonObserver::new()
            .to_json(&registry(), queries.iter())
            .unwrap();
        assert_eq!(
            json,
            r#"[{"name":"gets","labels":{"method":"GET"},"count":1000.0}]"#
        );
    }

    #[test]
    fn test_labels_sorted_by_key() {
        let queries = [Query::new("q")
            .with_label("status", "500")
            .with_label("method", "POST")];
        let json = JsonObserver::new()
            .to_json(&registry(), queries.iter())
            .unwrap();
        let method = json.find("method").unwrap();
        let status = json.find("status").unwrap();
        assert!(method < status);
    }

    #[test]
    fn test_unknown_dimension_is_zero() {
        let queries = [Query::new("puts").with_label("method", "PUT")];
        let snapshots = JsonObserver::new().collect(&registry(), queries.iter());
        assert_eq!(snapshots[0].count, 0.0);
    }

    #[test]
    fn test_pretty_output() {
        let queries = [Query::new("gets").with_label("method", "GET")];
        let json = JsonObserver::new()
            .pretty(true)
            .to_json(&registry(), queries.iter())
            .unwrap();
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_wrap_in_report() {
        let queries = [
            Query::new("gets").with_label("method", "GET"),
            Query::new("errors").with_label("status", "500"),
        ];
        let json = JsonObserver::new()
            .wrap_in_report(true)
            .to_json(&registry(), queries.iter())
            .unwrap();
        let report: RegistryReport = serde_json::from_str(&json).unwrap();

        assert_eq!(report.registry, "http_latency");
        assert_eq!(report.total_count, 1005.0);
        assert_eq!(report.slot_count, 5);
        assert_eq!(report.timestamp_ms, None);
        assert_eq!(report.get("errors").unwrap().count, 5.0);
        assert!(!json.contains("timestamp_ms"));
    }

    #[test]
    fn test_wrap_with_timestamp() {
        let observer = JsonObserver::new()
            .wrap_in_report(true)
            .include_timestamp(true);
        let report = observer.report(&registry(), [].iter());
        assert!(report.timestamp_ms.unwrap() > 0);
    }

    #[test]
    fn test_to_json_bytes_matches_string() {
        let queries = [Query::new("gets").with_label("method", "GET")];
        let observer = JsonObserver::new();
        let text = observer.to_json(&registry(), queries.iter()).unwrap();
        let bytes = observer.to_json_bytes(&registry(), queries.iter()).unwrap();
        assert_eq!(text.as_bytes(), bytes.as_slice());
    }
}
