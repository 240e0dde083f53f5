//! Demo rendering conjunction queries with every observer, before and after
//! a snapshot round trip.
//!
//! Run with:
//! ```bash
//! cargo run --example query_report --features full
//! ```

use hmsketch::observers::json::JsonObserver;
use hmsketch::observers::prometheus::PrometheusObserver;
use hmsketch::observers::table::TableObserver;
use hmsketch::{Histogram, Query, Registry};

fn record(registry: &Registry) {
    // (job, instance, region, latency ms, requests)
    let traffic = [
        ("api", "api-0", "eu", 12.0, 150.0),
        ("api", "api-1", "eu", 18.0, 120.0),
        ("api", "api-2", "us", 35.0, 90.0),
        ("batch", "batch-0", "eu", 850.0, 12.0),
        ("batch", "batch-1", "us", 1200.0, 8.0),
        ("web", "web-0", "us", 45.0, 300.0),
    ];

    for (job, instance, region, latency, requests) in traffic {
        registry.insert(
            [("job", job), ("instance", instance), ("region", region)],
            latency,
            requests,
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new(2).with_name("request_latency_ms");
    record(&registry);

    let queries = vec![
        Query::new("requests"),
        Query::new("requests").with_label("job", "api"),
        Query::new("requests")
            .with_label("job", "api")
            .with_label("region", "eu"),
        Query::new("requests")
            .with_label("job", "batch")
            .with_label("region", "us"),
        Query::new("requests").with_label("job", "cron"),
    ];

    println!("=== Table ===");
    println!("{}", TableObserver::new().render(&registry, queries.iter()));

    println!("\n=== Compact ===");
    println!(
        "{}",
        TableObserver::new()
            .compact(true)
            .columns(2)
            .render(&registry, queries.iter())
    );

    println!("\n=== JSON ===");
    println!(
        "{}",
        JsonObserver::new()
            .pretty(true)
            .wrap_in_report(true)
            .to_json(&registry, queries.iter())?
    );

    println!("\n=== Prometheus ===");
    println!(
        "{}",
        PrometheusObserver::new()
            .with_namespace("demo")
            .with_help("requests", "Requests matching the label conjunction")
            .render(&registry, queries.iter())?
    );

    let api_eu = registry.sketch([("job", "api"), ("region", "eu")]);
    println!(
        "api/eu: {} requests, read(12ms) = {}",
        api_eu.total(),
        api_eu.read(12.0)
    );

    let bytes = registry.serialize()?;
    let restored: Registry = Registry::deserialize(&bytes)?;
    println!(
        "\nsnapshot: {} bytes, {} slots, total {}",
        bytes.len(),
        restored.slot_count(),
        restored.total_count()
    );
    println!("{}", TableObserver::new().render(&restored, queries.iter()));

    Ok(())
}
