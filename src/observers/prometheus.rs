//! Prometheus observer for exporting query counts using the official `prometheus` crate.
//!
//! This module provides [`PrometheusObserver`], which evaluates a list of
//! [`Query`] values against a [`Registry`] and renders each count as a
//! Prometheus gauge using the official text format.
//!
//! # Feature Flag
//!
//! This module requires the `prometheus` feature:
//!
//! ```toml
//! [dependencies]
//! hmsketch = { version = "0.1", features = ["prometheus"] }
//! ```
//!
//! # How It Works
//!
//! Every query becomes one sample. The query name is the metric name and the
//! query's labels become the sample's labels, so queries sharing a name and
//! a label key set form a single metric family:
//!
//! ```text
//! # HELP myapp_requests approximate count of requests
//! # TYPE myapp_requests gauge
//! myapp_requests{method="GET"} 1000
//! myapp_requests{method="POST"} 5
//! ```
//!
//! Two queries with the same name but different label keys cannot share a
//! family and make [`render`](PrometheusObserver::render) fail.
//!
//! # Examples
//!
//! ```rust,ignore
//! use hmsketch::{Query, Registry};
//! use hmsketch::observers::prometheus::PrometheusObserver;
//!
//! let registry = Registry::new(2);
//! registry.insert([("method", "GET")], 12.0, 1000.0);
//!
//! let queries = [Query::new("requests").with_label("method", "GET")];
//! let observer = PrometheusObserver::new()
//!     .with_namespace("myapp")
//!     .with_const_label("instance", "localhost:8080")
//!     .with_help("requests", "Requests by method");
//!
//! println!("{}", observer.render(&registry, queries.iter())?);
//! # Ok::<(), hmsketch::observers::ObserverError>(())
//! ```

use std::collections::HashMap;

use crate::histogram::Histogram;
use crate::observers::error::PrometheusError;
use crate::observers::{evaluate, Result};
use crate::query::Query;
use crate::registry::Registry;
use prometheus::{Encoder, Gauge, Opts, TextEncoder};

/// Observer that exports query counts to Prometheus format.
#[derive(Debug, Clone, Default)]
pub struct PrometheusObserver {
    /// Namespace (prefix) for all metrics.
    namespace: Option<String>,
    /// Subsystem for all metrics.
    subsystem: Option<String>,
    /// Constant labels applied to all metrics.
    const_labels: HashMap<String, String>,
    /// Help text keyed by query name.
    help: HashMap<String, String>,
    /// Whether to emit the registry's total count as an extra gauge.
    total_count: bool,
}

impl PrometheusObserver {
    /// Creates a new `PrometheusObserver`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace (prefix) for all metrics.
    ///
    /// For example, namespace "myapp" + query "requests" = "myapp_requests".
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Sets the subsystem for all metrics.
    ///
    /// The subsystem appears between namespace and metric name.
    pub fn with_subsystem(mut self, subsystem: &str) -> Self {
        self.subsystem = Some(subsystem.to_string());
        self
    }

    /// Adds a constant label to all metrics.
    ///
    /// A query label with the same key takes precedence.
    pub fn with_const_label(mut self, name: &str, value: &str) -> Self {
        self.const_labels
            .insert(Self::sanitize_label(name), value.to_string());
        self
    }

    /// Sets the help text for the queries named `name`.
    pub fn with_help(mut self, name: &str, help: &str) -> Self {
        self.help.insert(name.to_string(), help.to_string());
        self
    }

    /// Also emits a `total_count` gauge holding the registry's global mass.
    pub fn with_total_count(mut self, enabled: bool) -> Self {
        self.total_count = enabled;
        self
    }

    /// Sanitizes a metric name to be Prometheus-compatible.
    ///
    /// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
    fn sanitize_name(name: &str) -> String {
        let mut result: String = name
            .chars()
            .filter_map(|c| match c {
                c if c.is_ascii_alphanumeric() || c == '_' || c == ':' => Some(c),
                '-' | '.' | ' ' | '/' => Some('_'),
                _ => None,
            })
            .collect();
        if result.is_empty() {
            result.push_str("unnamed");
        }
        if result.starts_with(|c: char| c.is_ascii_digit()) {
            result.insert(0, '_');
        }
        result
    }

    /// Label names follow the metric name rules minus the colon, and may not
    /// start with the reserved `__` prefix.
    fn sanitize_label(name: &str) -> String {
        let mut result = Self::sanitize_name(name).replace(':', "_");
        while result.starts_with("__") {
            result.remove(0);
        }
        result
    }

    /// Builds the full metric name with namespace and subsystem.
    fn build_full_name(&self, name: &str) -> String {
        let sanitized = Self::sanitize_name(name);
        match (&self.namespace, &self.subsystem) {
            (Some(ns), Some(ss)) => format!("{}_{}_{}", ns, ss, sanitized),
            (Some(ns), None) => format!("{}_{}", ns, sanitized),
            (None, Some(ss)) => format!("{}_{}", ss, sanitized),
            (None, None) => sanitized,
        }
    }

    fn register_gauge(
        registry: &prometheus::Registry,
        name: &str,
        help: &str,
        labels: HashMap<String, String>,
        value: f64,
    ) -> Result<()> {
        let opts = Opts::new(name, help).const_labels(labels);
        let gauge = Gauge::with_opts(opts)?;
        gauge.set(value);
        registry.register(Box::new(gauge))?;
        Ok(())
    }

    /// Evaluates `queries` against `registry` and renders the counts in the
    /// Prometheus text exposition format.
    ///
    /// A fresh Prometheus registry is built for each render, so repeated
    /// calls never conflict with previously registered metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if two queries produce conflicting metric
    /// descriptors, or if encoding fails.
    pub fn render<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> Result<String> {
        let exporter = prometheus::Registry::new();

        for result in evaluate(registry, queries) {
            let full_name = self.build_full_name(&result.name);
            let help = self
                .help
                .get(&result.name)
                .cloned()
                .unwrap_or_else(|| format!("approximate count of {}", result.name));

            let mut labels = self.const_labels.clone();
            for (key, value) in result.labels {
                labels.insert(Self::sanitize_label(&key), value);
            }

            Self::register_gauge(&exporter, &full_name, &help, labels, result.count)?;
        }

        if self.total_count {
            let mut labels = self.const_labels.clone();
            if !registry.name().is_empty() {
                labels.insert("registry".to_string(), registry.name().to_string());
            }
            Self::register_gauge(
                &exporter,
                &self.build_full_name("total_count"),
                "total mass of the global histogram",
                labels,
                registry.total_count(),
            )?;
        }

        Self::encode(&exporter)
    }

    /// Renders the query counts to bytes (useful for HTTP responses).
    ///
    /// # Errors
    ///
    /// Same as [`render`](Self::render).
    pub fn render_bytes<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> Result<Vec<u8>> {
        Ok(self.render(registry, queries)?.into_bytes())
    }

    fn encode(exporter: &prometheus::Registry) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = exporter.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| PrometheusError::EncodeError(e.to_string()))?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::ObserverError;

    fn registry() -> Registry {
        let registry = Registry::new(2).with_name("http_latency");
        registry.insert([("method", "GET")], 12.0, 1000.0);
        registry.insert([("method", "POST")], 40.0, 5.0);
        registry
    }

    #[test]
    fn test_render_empty() {
        let output = PrometheusObserver::new()
            .render(&registry(), [].iter())
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_render_unlabelled_query() {
        let queries = [Query::new("requests")];
        let output = PrometheusObserver::new()
            .render(&registry(), queries.iter())
            .unwrap();
        assert!(output.contains("# TYPE requests gauge"));
        assert!(output.contains("requests 1005"));
    }

    #[test]
    fn test_queries_share_a_family() {
        let queries = [
            Query::new("requests").with_label("method", "GET"),
            Query::new("requests").with_label("method", "POST"),
        ];
        let output = PrometheusObserver::new()
            .render(&registry(), queries.iter())
            .unwrap();
        assert_eq!(output.matches("# TYPE requests gauge").count(), 1);
        assert!(output.contains("requests{method=\"GET\"} 1000"));
        assert!(output.contains("requests{method=\"POST\"} 5"));
    }

    #[test]
    fn test_conflicting_label_keys_fail() {
        let queries = [
            Query::new("requests").with_label("method", "GET"),
            Query::new("requests").with_label("status", "200"),
        ];
        let err = PrometheusObserver::new()
            .render(&registry(), queries.iter())
            .unwrap_err();
        assert!(matches!(err, ObserverError::Prometheus(_)));
    }

    #[test]
    fn test_render_with_namespace_and_subsystem() {
        let queries = [Query::new("requests")];
        let output = PrometheusObserver::new()
            .with_namespace("myapp")
            .with_subsystem("http")
            .render(&registry(), queries.iter())
            .unwrap();
        assert!(output.contains("myapp_http_requests 1005"));
    }

    #[test]
    fn test_render_with_help() {
        let queries = [Query::new("requests")];
        let output = PrometheusObserver::new()
            .with_help("requests", "Requests by method")
            .render(&registry(), queries.iter())
            .unwrap();
        assert!(output.contains("# HELP requests Requests by method"));
    }

    #[test]
    fn test_const_labels() {
        let queries = [Query::new("requests")];
        let output = PrometheusObserver::new()
            .with_const_label("instance", "localhost:8080")
            .render(&registry(), queries.iter())
            .unwrap();
        assert!(output.contains("requests{instance=\"localhost:8080\"} 1005"));
    }

    #[test]
    fn test_total_count() {
        let output = PrometheusObserver::new()
            .with_total_count(true)
            .render(&registry(), [].iter())
            .unwrap();
        assert!(output.contains("total_count{registry=\"http_latency\"} 1005"));
    }

    #[test]
    fn test_unknown_dimension_renders_zero() {
        let queries = [Query::new("puts").with_label("method", "PUT")];
        let output = PrometheusObserver::new()
            .render(&registry(), queries.iter())
            .unwrap();
        assert!(output.contains("puts{method=\"PUT\"} 0"));
    }

    #[test]
    fn test_render_bytes() {
        let queries = [Query::new("requests")];
        let bytes = PrometheusObserver::new()
            .render_bytes(&registry(), queries.iter())
            .unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("requests 1005"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(PrometheusObserver::sanitize_name("valid_name"), "valid_name");
        assert_eq!(PrometheusObserver::sanitize_name("with-dash"), "with_dash");
        assert_eq!(PrometheusObserver::sanitize_name("with.dot"), "with_dot");
        assert_eq!(PrometheusObserver::sanitize_name(""), "unnamed");
        assert_eq!(PrometheusObserver::sanitize_name("123starts"), "_123starts");
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(PrometheusObserver::sanitize_label("a:b"), "a_b");
        assert_eq!(PrometheusObserver::sanitize_label("__name"), "_name");
        assert_eq!(PrometheusObserver::sanitize_label("job"), "job");
    }

    #[test]
    fn test_error_display() {
        let err = PrometheusError::EncodeError("encode failed".to_string());
        assert_eq!(format!("{}", err), "encode error: encode failed");
    }
}
