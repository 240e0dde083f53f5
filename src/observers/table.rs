//! Table observer for pretty-printing query counts.
//!
//! This module provides [`TableObserver`], which evaluates a list of
//! [`Query`] values against a registry and renders the counts as a formatted
//! ASCII table using the `tabled` crate.
//!
//! # Feature Flag
//!
//! This module requires the `table` feature:
//!
//! ```toml
//! [dependencies]
//! hmsketch = { version = "0.1", features = ["table"] }
//! ```
//!
//! # Examples
//!
//! ## Standard format
//!
//! ```rust,ignore
//! use hmsketch::{Query, Registry};
//! use hmsketch::observers::table::{TableObserver, TableStyle};
//!
//! let registry = Registry::new(2);
//! registry.insert([("method", "GET")], 12.0, 1000.0);
//! registry.insert([("method", "POST")], 40.0, 5.0);
//!
//! let queries = [
//!     Query::new("gets").with_label("method", "GET"),
//!     Query::new("posts").with_label("method", "POST"),
//! ];
//!
//! let observer = TableObserver::new().with_style(TableStyle::Rounded);
//! println!("{}", observer.render(&registry, queries.iter()));
//! // ╭───────┬─────────────┬───────╮
//! // │ Query │ Labels      │ Count │
//! // ├───────┼─────────────┼───────┤
//! // │ gets  │ method=GET  │ 1000  │
//! // │ posts │ method=POST │ 5     │
//! // ╰───────┴─────────────┴───────╯
//! ```
//!
//! ## Compact format (multiple columns)
//!
//! ```rust,ignore
//! let observer = TableObserver::new().compact(true).columns(2);
//! println!("{}", observer.render(&registry, queries.iter()));
//! // ╭──────────────────────────┬─────────────────────────╮
//! // │ gets{method=GET}: 1000   │ posts{method=POST}: 5   │
//! // ╰──────────────────────────┴─────────────────────────╯
//! ```

use crate::histogram::Histogram;
use crate::observers::{evaluate, QueryResult};
use crate::query::Query;
use crate::registry::Registry;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Available table styles for rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableStyle {
    /// ASCII table with simple characters: +, -, |
    Ascii,
    /// Modern rounded corners (default)
    #[default]
    Rounded,
    /// Sharp corners with box-drawing characters
    Sharp,
    /// Modern style with clean lines
    Modern,
    /// GitHub-flavored Markdown table
    Markdown,
    /// No borders, just spacing
    Blank,
}

/// Separator style between query and count in compact mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompactSeparator {
    /// Colon separator: "query: count"
    #[default]
    Colon,
    /// Equals separator: "query = count"
    Equals,
    /// Arrow separator: "query → count"
    Arrow,
}

impl CompactSeparator {
    /// Returns the separator string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompactSeparator::Colon => ": ",
            CompactSeparator::Equals => " = ",
            CompactSeparator::Arrow => " → ",
        }
    }
}

/// Configuration for the table observer.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// The style to use for rendering.
    pub style: TableStyle,
    /// Whether to show the header row (only in non-compact mode).
    pub show_header: bool,
    /// Custom title for the table. Defaults to the registry name when unset.
    pub title: Option<String>,
    /// Whether to use compact format (`query{labels}: count` cells).
    pub compact: bool,
    /// Number of columns in compact mode.
    pub columns: usize,
    /// Separator between query and count in compact mode.
    pub separator: CompactSeparator,
    /// Fixed number of decimals for counts; `None` prints the shortest form.
    pub precision: Option<usize>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            style: TableStyle::default(),
            show_header: true,
            title: None,
            compact: false,
            columns: 1,
            separator: CompactSeparator::default(),
            precision: None,
        }
    }
}

/// Internal row representation for tabled (standard mode).
#[derive(Tabled)]
struct QueryRow {
    #[tabled(rename = "Query")]
    name: String,
    #[tabled(rename = "Labels")]
    labels: String,
    #[tabled(rename = "Count")]
    count: String,
}

/// An observer that renders query counts as a formatted ASCII table.
///
/// Supports two rendering modes:
///
/// 1. **Standard mode**: three columns, Query, Labels and Count
/// 2. **Compact mode**: multi-column grid of `query{labels}: count` cells
#[derive(Debug, Clone, Default)]
pub struct TableObserver {
    config: TableConfig,
}

impl TableObserver {
    /// Creates a new table observer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new table observer with the specified configuration.
    pub fn with_config(config: TableConfig) -> Self {
        Self { config }
    }

    /// Sets the table style.
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.config.style = style;
        self
    }

    /// Sets whether to show the header row.
    pub fn with_header(mut self, show: bool) -> Self {
        self.config.show_header = show;
        self
    }

    /// Sets a title printed above the table.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    /// Enables or disables compact mode.
    pub fn compact(mut self, enabled: bool) -> Self {
        self.config.compact = enabled;
        self
    }

    /// Sets the number of columns in compact mode. Values below 1 become 1.
    pub fn columns(mut self, count: usize) -> Self {
        self.config.columns = count.max(1);
        self
    }

    /// Sets the separator used in compact mode.
    pub fn separator(mut self, sep: CompactSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    /// Prints counts with a fixed number of decimals.
    pub fn precision(mut self, decimals: usize) -> Self {
        self.config.precision = Some(decimals);
        self
    }

    fn apply_style(&self, table: &mut Table) {
        match self.config.style {
            TableStyle::Ascii => {
                table.with(Style::ascii());
            }
            TableStyle::Rounded => {
                table.with(Style::rounded());
            }
            TableStyle::Sharp => {
                table.with(Style::sharp());
            }
            TableStyle::Modern => {
                table.with(Style::modern());
            }
            TableStyle::Markdown => {
                table.with(Style::markdown());
            }
            TableStyle::Blank => {
                table.with(Style::blank());
            }
        }
    }

    fn format_count(&self, count: f64) -> String {
        match self.config.precision {
            Some(decimals) => format!("{:.*}", decimals, count),
            None => count.to_string(),
        }
    }

    fn with_title_line(&self, registry_name: &str, table: String) -> String {
        let title = self
            .config
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(Some(registry_name).filter(|n| !n.is_empty()));
        match title {
            Some(title) => format!("{}\n{}", title, table),
            None => table,
        }
    }

    fn render_compact(&self, results: &[QueryResult]) -> String {
        let cells: Vec<String> = results
            .iter()
            .map(|result| {
                format!(
                    "{}{{{}}}{}{}",
                    result.name,
                    result.labels_string(),
                    self.config.separator.as_str(),
                    self.format_count(result.count)
                )
            })
            .collect();

        if cells.is_empty() {
            return String::new();
        }

        let cols = self.config.columns;
        let mut builder = Builder::default();
        for chunk in cells.chunks(cols) {
            let mut row: Vec<String> = chunk.to_vec();
            while row.len() < cols {
                row.push(String::new());
            }
            builder.push_record(row);
        }

        let mut table = builder.build();
        self.apply_style(&mut table);
        table.to_string()
    }

    fn render_standard(&self, results: &[QueryResult]) -> String {
        let rows: Vec<QueryRow> = results
            .iter()
            .map(|result| QueryRow {
                name: result.name.clone(),
                labels: result.labels_string(),
                count: self.format_count(result.count),
            })
            .collect();

        let mut table = Table::new(&rows);
        self.apply_style(&mut table);

        if !self.config.show_header {
            table.with(tabled::settings::Remove::row(
                tabled::settings::object::Rows::first(),
            ));
        }
        table.to_string()
    }

    /// Evaluates `queries` against `registry` and renders the counts.
    ///
    /// The title line is the configured title, or the registry name when no
    /// title was set. Compact mode renders nothing for an empty query list.
    pub fn render<'a, H: Histogram>(
        &self,
        registry: &Registry<H>,
        queries: impl Iterator<Item = &'a Query>,
    ) -> String {
        let results = evaluate(registry, queries);
        let table = if self.config.compact {
            self.render_compact(&results)
        } else {
            self.render_standard(&results)
        };
        if table.is_empty() {
            return table;
        }
        self.with_title_line(registry.name(), table)
    }
}
