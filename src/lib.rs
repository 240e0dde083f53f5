//! # hmsketch - Labeled Approximate Histograms
//!
//! A Rust library for recording `(value, count)` observations tagged with
//! arbitrary `key=value` labels and later asking for the approximate
//! distribution of any *conjunction* of labels, without keeping one histogram
//! per label combination.
//!
//! ## The Problem
//!
//! A latency metric labelled with `service`, `instance`, `job` and `region`
//! can easily reach millions of distinct label combinations. Keeping an exact
//! histogram per combination is combinatorially infeasible, yet queries like
//! "latency of `job=api` in `region=eu`" still need an answer.
//!
//! ## The Solution: Marginals and Minimums
//!
//! The [`Registry`] stores one *marginal* histogram per single `key=value`
//! pair, plus a global histogram over everything. A conjunction query starts
//! from the global histogram and takes the per-bucket minimum with each
//! requested marginal:
//!
//! ```text
//!   insert({job=api, region=eu}, 12ms)
//!
//!        ┌──────────► global     [ .. ▇ .. ]
//!        ├──────────► job=api    [ .. ▇ .. ]
//!        └──────────► region=eu  [ .. ▇ .. ]
//!
//!   sketch({job=api, region=eu}) = min(global, job=api, region=eu)
//! ```
//!
//! Memory grows with the number of distinct label *pairs*, not with the
//! number of combinations. The estimate is an upper bound per bucket and is
//! exact whenever the requested labels always co-occur.
//!
//! ### Design Principles
//!
//! 1. **Stable addressing**: each label pair maps to a slot through a keyed
//!    SipHash with fixed key material ([`hash`]), so independently built
//!    registries agree on every slot.
//!
//! 2. **Registry algebra**: [`Registry::combine`] merges two registries and
//!    [`Registry::cancel`] subtracts one from another. `end.cancel(&start)`
//!    yields what accrued inside a time window.
//!
//! 3. **Pluggable histograms**: the registry only relies on the [`Histogram`]
//!    trait. [`LogLinear`] is the default implementation.
//!
//! 4. **One lock**: slot allocation and histogram updates happen under a
//!    single mutex per registry, which keeps the index and the histogram
//!    list consistent at all times.
//!
//! ## Quick Start
//!
//! ```rust
//! use hmsketch::{Histogram, Registry};
//!
//! let registry = Registry::new(2).with_name("request_latency_ms");
//!
//! registry.insert([("job", "api"), ("region", "eu")], 12.0, 1.0);
//! registry.insert([("job", "api"), ("region", "us")], 48.0, 1.0);
//! registry.insert([("job", "batch"), ("region", "eu")], 900.0, 1.0);
//!
//! assert_eq!(registry.total_count(), 3.0);
//! assert_eq!(registry.count([("job", "api")]), 2.0);
//! assert_eq!(registry.count([("job", "api"), ("region", "eu")]), 1.0);
//!
//! let sketch = registry.sketch([("region", "eu")]);
//! assert_eq!(sketch.read(12.0), 1.0);
//!
//! // Snapshots round-trip exactly
//! let bytes = registry.serialize()?;
//! let restored: Registry = Registry::deserialize(&bytes)?;
//! assert_eq!(restored.total_count(), 3.0);
//! # Ok::<(), hmsketch::Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! [`Registry`] is `Send + Sync` and can be shared across threads with
//! `Arc<Registry>`.
//!
//! ## Memory Usage
//!
//! A registry never evicts: its slot count is the number of distinct label
//! pairs ever observed plus one. Watch [`Registry::slot_count`] if label
//! values are unbounded (user ids, request ids, ...).
//!
//! ## Observers
//!
//! Optional observer modules render query results, each gated behind a
//! feature flag:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | `observers::table` | Pretty-print query counts as ASCII tables |
//! | `json` | `observers::json` | Serialize query counts to JSON |
//! | `prometheus` | `observers::prometheus` | Export query counts in Prometheus exposition format |
//! | `full` | All observers | Enables all observer modules |
//!
//! ```rust,ignore
//! use hmsketch::{Query, Registry};
//! use hmsketch::observers::table::TableObserver;
//!
//! let registry = Registry::new(2).with_name("http_latency");
//! registry.insert([("method", "GET")], 12.0, 1.0);
//!
//! let queries = [Query::new("gets").with_label("method", "GET")];
//! println!("{}", TableObserver::new().render(&registry, queries.iter()));
//! ```

pub mod error;
pub mod hash;
pub mod histogram;
pub mod observers;
pub mod query;
pub mod registry;
pub mod snapshot;

pub use error::{Error, Result};
pub use histogram::{Histogram, LogLinear};
pub use query::Query;
pub use registry::{Registry, DEFAULT_RESOLUTION};
pub use snapshot::RegistrySnapshot;
