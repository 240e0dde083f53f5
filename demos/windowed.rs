//! Demo application showcasing windowed queries over a labeled registry.
//!
//! Worker threads record request latencies into one shared registry. At
//! every window boundary the registry is snapshotted, and the traffic of the
//! window is recovered with `end.cancel(&start)`.
//!
//! Run with:
//! ```bash
//! cargo run --example windowed --features demo -- --help
//! RUST_LOG=hmsketch=debug cargo run --example windowed --features demo -- --windows 3
//! ```

use clap::{Parser, ValueEnum};
use hmsketch::observers::json::JsonObserver;
use hmsketch::observers::prometheus::PrometheusObserver;
use hmsketch::observers::table::{TableObserver, TableStyle};
use hmsketch::{LogLinear, Query, Registry};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Output format for window reports.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty ASCII table
    Table,
    /// Compact table with multiple columns
    Compact,
    /// JSON format
    Json,
    /// Prometheus exposition format
    Prometheus,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Windowed latency queries over a labeled approximate-histogram registry.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Table style (for table/compact formats)
    #[arg(short, long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Number of columns (for compact format)
    #[arg(short, long, default_value = "2")]
    columns: usize,

    /// Histogram resolution in significant decimal digits
    #[arg(short, long, default_value_t = hmsketch::DEFAULT_RESOLUTION)]
    resolution: u32,

    /// Number of windows to simulate
    #[arg(short, long, default_value = "3")]
    windows: usize,

    /// Worker threads per window
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Requests recorded per thread per window
    #[arg(long, default_value = "2500")]
    iterations: usize,

    /// Also print the cumulative registry after the last window
    #[arg(long)]
    cumulative: bool,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// Prometheus metric namespace (prefix)
    #[arg(long, default_value = "demo")]
    namespace: String,
}

const METHODS: [&str; 3] = ["GET", "POST", "PUT"];
const REGIONS: [&str; 2] = ["eu", "us"];

/// Records one window of traffic. The error rate and latency grow with the
/// window number so that consecutive windows look different.
fn simulate_window(registry: &Arc<Registry>, window: usize, threads: usize, iterations: usize) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(registry);
            thread::spawn(move || {
                let region = REGIONS[t % REGIONS.len()];
                for j in 0..iterations {
                    let method = METHODS[j % METHODS.len()];
                    let status = if j % (20 - window.min(15)) == 0 {
                        "500"
                    } else {
                        "200"
                    };
                    let latency = (10 + (j % 200) * (window + 1)) as f64;
                    registry.insert(
                        [("method", method), ("region", region), ("status", status)],
                        latency,
                        1.0,
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            tracing::error!(window, "worker thread panicked");
        }
    }
}

fn queries() -> Vec<Query> {
    let mut queries = vec![Query::new("requests")];
    for method in METHODS {
        queries.push(Query::new("requests").with_label("method", method));
    }
    for region in REGIONS {
        queries.push(
            Query::new("errors")
                .with_label("region", region)
                .with_label("status", "500"),
        );
    }
    queries
}

fn render(args: &Args, registry: &Registry<LogLinear>, queries: &[Query]) -> String {
    match args.format {
        OutputFormat::Table => TableObserver::new()
            .with_style(args.style.into())
            .render(registry, queries.iter()),
        OutputFormat::Compact => TableObserver::new()
            .compact(true)
            .columns(args.columns)
            .with_style(args.style.into())
            .render(registry, queries.iter()),
        OutputFormat::Json => JsonObserver::new()
            .pretty(args.pretty)
            .wrap_in_report(true)
            .to_json(registry, queries.iter())
            .unwrap_or_else(|e| format!("Error: {}", e)),
        OutputFormat::Prometheus => PrometheusObserver::new()
            .with_namespace(&args.namespace)
            .with_help("requests", "Requests recorded in the window")
            .with_help("errors", "Failed requests recorded in the window")
            .with_total_count(true)
            .render(registry, queries.iter())
            .unwrap_or_else(|e| format!("Error: {}", e)),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let queries = queries();
    let registry = Arc::new(Registry::new(args.resolution).with_name("http_latency_ms"));

    for window in 0..args.windows {
        let start = registry.as_ref().clone();
        simulate_window(&registry, window, args.threads, args.iterations);
        let end = registry.as_ref().clone();

        let delta = end.cancel(&start).with_name(format!("window_{}", window));
        info!(
            window,
            requests = delta.total_count(),
            slots = delta.slot_count(),
            "window closed"
        );

        if let Some(p99) = delta.global().quantile(0.99).ok().flatten() {
            eprintln!("window {}: p99 latency ~ {} ms", window, p99);
        }
        println!("{}", render(&args, &delta, &queries));
    }

    if args.cumulative {
        println!("{}", render(&args, &registry, &queries));
    }
}
