//! Observer implementations for rendering query results.
//!
//! An observer evaluates a list of [`Query`] values against a [`Registry`]
//! and renders the approximate counts:
//!
//! - [`table`] - Pretty-print query counts as tables using the `tabled` crate
//! - [`json`] - Serialize query counts to JSON format
//! - [`prometheus`] - Export query counts in Prometheus exposition format
//!
//! # Unified Error Handling
//!
//! Fallible observers return the unified [`ObserverError`] type, allowing you
//! to switch between observers without changing error handling code.
//!
//! # Feature Flags
//!
//! Each observer is gated behind a feature flag to minimize dependencies:
//!
//! - `table` - Enables the [`table`] module
//! - `json` - Enables the [`json`] module
//! - `prometheus` - Enables the [`prometheus`] module
//! - `full` - Enables all observer modules
//!
//! # Example
//!
//! ```rust
//! use hmsketch::{Query, Registry};
//! use hmsketch::observers::evaluate;
//!
//! let registry = Registry::new(2);
//! registry.insert([("method", "GET"), ("status", "200")], 12.0, 3.0);
//! registry.insert([("method", "POST"), ("status", "500")], 80.0, 1.0);
//!
//! let queries = [
//!     Query::new("get_ok").with_label("method", "GET").with_label("status", "200"),
//!     Query::new("errors").with_label("status", "500"),
//! ];
//!
//! let results = evaluate(&registry, queries.iter());
//! assert_eq!(results[0].count, 3.0);
//! assert_eq!(results[1].count, 1.0);
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "prometheus")]
pub use error::PrometheusError;

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "prometheus")]
pub mod prometheus;

use crate::histogram::Histogram;
use crate::query::Query;
use crate::registry::Registry;

/// The approximate count of one query, as seen by every observer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Query name, `(unnamed)` when the query had none.
    pub name: String,
    /// The query's labels in their original order.
    pub labels: Vec<(String, String)>,
    /// Approximate number of matching observations.
    pub count: f64,
}

impl QueryResult {
    /// Formats the labels as `k1=v1,k2=v2`.
    pub fn labels_string(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Evaluates every query against `registry`, preserving query order.
pub fn evaluate<'a, H: Histogram>(
    registry: &Registry<H>,
    queries: impl Iterator<Item = &'a Query>,
) -> Vec<QueryResult> {
    queries
        .map(|query| QueryResult {
            name: query.display_name().to_string(),
            labels: query.labels().to_vec(),
            count: registry.count(query),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_preserves_order() {
        let registry = Registry::new(2);
        registry.insert([("a", "1")], 1.0, 2.0);
        registry.insert([("b", "1")], 1.0, 5.0);

        let queries = [
            Query::new("b").with_label("b", "1"),
            Query::new("a").with_label("a", "1"),
            Query::new("all"),
        ];
        let results = evaluate(&registry, queries.iter());

        let counts: Vec<f64> = results.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![5.0, 2.0, 7.0]);
        assert_eq!(results[0].name, "b");
    }

    #[test]
    fn test_evaluate_unknown_dimension() {
        let registry = Registry::new(2);
        registry.insert([("a", "1")], 1.0, 2.0);
        let queries = [Query::default().with_label("a", "2")];
        let results = evaluate(&registry, queries.iter());
        assert_eq!(results[0].count, 0.0);
        assert_eq!(results[0].name, "(unnamed)");
        assert_eq!(results[0].labels_string(), "a=2");
    }
}
