//! Named label conjunctions.
//!
//! A [`Query`] is an ordered set of `key=value` labels with an optional name.
//! It is the unit that [observers](crate::observers) evaluate against a
//! registry, and since `&Query` iterates as `(&str, &str)` pairs it can be
//! passed anywhere the registry expects a label set.
//!
//! # Example
//!
//! ```rust
//! use hmsketch::{Query, Registry};
//!
//! let registry = Registry::new(2);
//! let checkout = Query::new("checkout_latency")
//!     .with_label("service", "checkout")
//!     .with_label("region", "eu");
//!
//! registry.insert(&checkout, 12.5, 1.0);
//! registry.insert([("service", "checkout"), ("region", "us")], 40.0, 1.0);
//!
//! assert_eq!(registry.count(&checkout), 1.0);
//! assert_eq!(registry.total_count(), 2.0);
//! ```

use std::fmt::{self, Display};

/// An optionally named conjunction of label constraints.
///
/// Labels keep their insertion order; setting a key that is already present
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    name: String,
    labels: Vec<(String, String)>,
}

impl Query {
    /// Creates an empty query with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Creates a query with pre-defined labels.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hmsketch::Query;
    ///
    /// let labels = vec![
    ///     ("env".to_string(), "production".to_string()),
    ///     ("region".to_string(), "us-east".to_string()),
    /// ];
    ///
    /// let query = Query::with_labels("prod_us", labels);
    /// assert_eq!(query.label_count(), 2);
    /// ```
    pub fn with_labels(name: impl Into<String>, labels: Vec<(String, String)>) -> Self {
        let mut query = Self::new(name);
        for (key, value) in labels {
            query.add_label(key, value);
        }
        query
    }

    /// Adds a label, returning `self` for chaining.
    ///
    /// If the key already exists, its value is updated.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_label(key, value);
        self
    }

    /// Adds a label to an existing query (non-builder form).
    pub fn add_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if let Some(pos) = self.labels.iter().position(|(k, _)| k == &key) {
            self.labels[pos].1 = value;
        } else {
            self.labels.push((key, value));
        }
    }

    /// Removes a label, returning its previous value if it existed.
    pub fn remove_label(&mut self, key: &str) -> Option<String> {
        let pos = self.labels.iter().position(|(k, _)| k == key)?;
        Some(self.labels.remove(pos).1)
    }

    /// Returns the value of a label, if present.
    pub fn get_label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the name of this query (empty if unnamed).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns an iterator over all labels as `(&str, &str)` pairs.
    pub fn labels_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the labels as a slice.
    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Returns the number of labels.
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if the query constrains at least one label.
    ///
    /// A query without labels matches every observation.
    pub fn has_labels(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Formats the labels as `k1=v1,k2=v2`.
    pub fn labels_string(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Returns the name, or `(unnamed)` when none was set.
    pub(crate) fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(unnamed)"
        } else {
            &self.name
        }
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (String, String)>,
        fn(&'a (String, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn as_pair(label: &(String, String)) -> (&str, &str) {
            (label.0.as_str(), label.1.as_str())
        }
        self.labels
            .iter()
            .map(as_pair as fn(&'a (String, String)) -> (&'a str, &'a str))
    }
}

impl Display for Query {
    /// Formats the query as `name{k1=v1,k2=v2}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.name, self.labels_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let query = Query::new("latency");
        assert_eq!(query.name(), "latency");
        assert!(!query.has_labels());
    }

    #[test]
    fn test_with_label() {
        let query = Query::new("q")
            .with_label("method", "GET")
            .with_label("path", "/api");

        assert_eq!(query.get_label("method"), Some("GET"));
        assert_eq!(query.get_label("path"), Some("/api"));
        assert_eq!(query.label_count(), 2);
    }

    #[test]
    fn test_label_update() {
        let query = Query::new("q")
            .with_label("key", "old")
            .with_label("key", "new");

        assert_eq!(query.get_label("key"), Some("new"));
        assert_eq!(query.label_count(), 1);
    }

    #[test]
    fn test_with_labels_deduplicates_keys() {
        let query = Query::with_labels(
            "q",
            vec![
                ("a".to_string(), "1".to_string()),
                ("a".to_string(), "2".to_string()),
            ],
        );
        assert_eq!(query.label_count(), 1);
        assert_eq!(query.get_label("a"), Some("2"));
    }

    #[test]
    fn test_remove_label() {
        let mut query = Query::new("q").with_label("key", "value");

        assert_eq!(query.remove_label("key"), Some("value".to_string()));
        assert_eq!(query.remove_label("key"), None);
        assert!(query.get_label("key").is_none());
    }

    #[test]
    fn test_labels_order_preserved() {
        let query = Query::new("q")
            .with_label("c", "3")
            .with_label("a", "1")
            .with_label("b", "2");

        let labels: Vec<_> = query.labels_iter().collect();
        assert_eq!(labels, vec![("c", "3"), ("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_into_iterator() {
        let query = Query::new("q").with_label("a", "1").with_label("b", "2");
        let pairs: Vec<(&str, &str)> = (&query).into_iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_display() {
        let query = Query::new("http").with_label("method", "GET").with_label("code", "200");
        assert_eq!(query.to_string(), "http{method=GET,code=200}");
        assert_eq!(query.labels_string(), "method=GET,code=200");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Query::default().display_name(), "(unnamed)");
        assert_eq!(Query::new("x").display_name(), "x");
    }
}
