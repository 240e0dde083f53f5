//! The histogram contract and its default implementation.
//!
//! A [`Registry`](crate::Registry) never looks inside the histograms it
//! stores. It only needs them to behave like mergeable values: built for a
//! resolution, fed `(value, count)` observations, merged, subtracted and
//! narrowed with a per-bucket minimum. That contract is the [`Histogram`]
//! trait; [`LogLinear`] is the implementation the registry uses by default.
//!
//! # Algebra
//!
//! ```text
//!   a.combine(b)        per-bucket a + b      (associative, commutative)
//!   a.cancel(b)         per-bucket a - b      (a.combine(b).cancel(b) == a)
//!   a.min(b)            per-bucket min(a, b)  (associative, commutative)
//! ```
//!
//! `min` is what makes conjunction queries work: the mass of
//! `{job=api, region=eu}` in any bucket can be no larger than the mass of
//! `job=api` or of `region=eu` in that same bucket, so the minimum over the
//! marginals is an upper-bound estimate of the joint distribution.

pub mod log_linear;

pub use log_linear::{Bin, LogLinear, MAX_RESOLUTION, NAN_BIN, ZERO_BIN};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A mergeable approximate histogram.
///
/// Implementors behave as values: `combine`, `cancel` and `min` return a new
/// histogram and leave both operands untouched. Only `insert` mutates.
///
/// Histograms must be serializable because they are stored verbatim inside
/// registry snapshots.
pub trait Histogram: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Creates an empty histogram with the given resolution.
    fn new(resolution: u32) -> Self;

    /// Records `count` mass at `value`. Total mass grows by exactly `count`.
    fn insert(&mut self, value: f64, count: f64);

    /// Returns the union of both histograms' mass.
    fn combine(&self, other: &Self) -> Self;

    /// Returns this histogram with `other`'s mass removed.
    ///
    /// Buckets present only in `other` end up with negative mass.
    fn cancel(&self, other: &Self) -> Self;

    /// Returns the per-bucket minimum of both histograms.
    fn min(&self, other: &Self) -> Self;

    /// Total recorded mass.
    fn total(&self) -> f64;

    /// Mass recorded in the bucket that holds `value`.
    fn read(&self, value: f64) -> f64;

    /// The resolution this histogram was created with.
    fn resolution(&self) -> u32;

    /// Returns the same mass re-bucketed for `resolution`.
    ///
    /// Used when merging registries built with different resolutions.
    fn rescale(&self, resolution: u32) -> Self;
}
