//! Log-linear histogram with decimal significant-digit buckets.
//!
//! [`LogLinear`] follows the OpenHistogram (circllhist) layout: every finite,
//! non-zero value is bucketed by its first `resolution` significant decimal
//! digits and its base-10 exponent. With the usual resolution of 2 that gives
//! 90 buckets per decade and a relative error of at most 10%:
//!
//! ```text
//!   value      resolution 2        resolution 3
//!   10.4   ->  [10, 11)            [10.4, 10.5)
//!   45.4   ->  [45, 46)            [45.4, 45.5)
//!   0.123  ->  [0.12, 0.13)        [0.123, 0.124)
//!   -7.25  ->  (-7.3, -7.2]        (-7.26, -7.25]
//! ```
//!
//! Zero has a bucket of its own and every non-finite value lands in
//! [`NAN_BIN`].
//!
//! # Examples
//!
//! ```rust
//! use hmsketch::histogram::{Histogram, LogLinear};
//!
//! let mut latency = LogLinear::new(2);
//! latency.insert(10.4, 1.0);
//! latency.insert(10.9, 2.0);
//! latency.insert(45.4, 1.0);
//!
//! assert_eq!(latency.total(), 4.0);
//! // 10.4 and 10.9 share the [10, 11) bucket
//! assert_eq!(latency.read(10.0), 3.0);
//! ```

use crate::error::{Error, Result};
use crate::histogram::Histogram;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Largest supported resolution. Mantissas must fit comfortably in an `i64`.
pub const MAX_RESOLUTION: u32 = 15;

/// Largest decimal exponent magnitude a bin may carry. Finite `f64` values
/// stay well inside it.
const EXPONENT_LIMIT: u32 = 400;

/// Bucket holding exact zeros.
pub const ZERO_BIN: Bin = Bin {
    mantissa: 0,
    exponent: 0,
};

/// Bucket holding NaN and infinities.
pub const NAN_BIN: Bin = Bin {
    mantissa: 0,
    exponent: i32::MAX,
};

/// A single bucket: a signed mantissa of `resolution` digits and a decimal exponent.
///
/// The bucket for a positive value covers
/// `[mantissa, mantissa + 1) * 10^(exponent - digits + 1)`; negative buckets
/// mirror that range around zero.
///
/// Bins order numerically, with [`NAN_BIN`] after every finite bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bin {
    mantissa: i64,
    exponent: i32,
}

impl Bin {
    /// Returns the bucket holding `value` at the given resolution.
    pub fn of(value: f64, resolution: u32) -> Bin {
        if !value.is_finite() {
            return NAN_BIN;
        }
        if value == 0.0 {
            return ZERO_BIN;
        }

        let digits = resolution.clamp(1, MAX_RESOLUTION) as i32;
        let lowest = 10i64.pow(digits as u32 - 1);
        let highest = 10i64.pow(digits as u32) - 1;

        let magnitude = value.abs();
        let mut exponent = magnitude.log10().floor() as i32;
        let mut mantissa = Self::scale(magnitude, digits, exponent);

        // log10 is off by one ulp near exact powers of ten
        if mantissa > highest {
            exponent += 1;
            mantissa = Self::scale(magnitude, digits, exponent);
        } else if mantissa < lowest {
            exponent -= 1;
            mantissa = Self::scale(magnitude, digits, exponent);
        }
        let mantissa = mantissa.clamp(lowest, highest);

        Bin {
            mantissa: if value < 0.0 { -mantissa } else { mantissa },
            exponent,
        }
    }

    fn scale(magnitude: f64, digits: i32, exponent: i32) -> i64 {
        (magnitude * 10f64.powi(digits - 1 - exponent)).floor() as i64
    }

    /// The signed mantissa.
    pub fn mantissa(&self) -> i64 {
        self.mantissa
    }

    /// The decimal exponent of the leading digit.
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Returns `true` for the bucket of non-finite values.
    pub fn is_nan(&self) -> bool {
        *self == NAN_BIN
    }

    /// Width of one mantissa step, `10^(exponent - digits + 1)`.
    fn step(&self) -> f64 {
        let digits = decimal_digits(self.mantissa.unsigned_abs()) as i32;
        10f64.powi(self.exponent - digits + 1)
    }

    /// Smallest value that falls into this bucket (or its closed end for negatives).
    pub fn lower_bound(&self) -> f64 {
        if self.is_nan() {
            return f64::NAN;
        }
        let step = self.step();
        if self.mantissa < 0 {
            (self.mantissa - 1) as f64 * step
        } else {
            self.mantissa as f64 * step
        }
    }

    /// Upper edge of this bucket.
    pub fn upper_bound(&self) -> f64 {
        if self.is_nan() {
            return f64::NAN;
        }
        if *self == ZERO_BIN {
            return 0.0;
        }
        let step = self.step();
        if self.mantissa < 0 {
            self.mantissa as f64 * step
        } else {
            (self.mantissa + 1) as f64 * step
        }
    }

    /// Midpoint of the bucket, used as its representative value.
    pub fn midpoint(&self) -> f64 {
        (self.lower_bound() + self.upper_bound()) / 2.0
    }

    /// Returns `true` if this bin could have been produced by [`Bin::of`] at
    /// `resolution`: a mantissa of exactly `resolution` digits and an
    /// exponent within the decimal range of `f64`.
    pub fn fits(&self, resolution: u32) -> bool {
        if *self == ZERO_BIN || *self == NAN_BIN {
            return true;
        }
        self.mantissa != 0
            && decimal_digits(self.mantissa.unsigned_abs()) == resolution
            && self.exponent.unsigned_abs() <= EXPONENT_LIMIT
    }

    fn sign_class(&self) -> i8 {
        if self.is_nan() {
            2
        } else {
            self.mantissa.signum() as i8
        }
    }
}

impl Ord for Bin {
    fn cmp(&self, other: &Self) -> Ordering {
        let class = self.sign_class().cmp(&other.sign_class());
        if class != Ordering::Equal {
            return class;
        }
        let by_magnitude = (self.exponent, self.mantissa.unsigned_abs())
            .cmp(&(other.exponent, other.mantissa.unsigned_abs()));
        if self.mantissa < 0 {
            by_magnitude.reverse()
        } else {
            by_magnitude
        }
    }
}

impl PartialOrd for Bin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn decimal_digits(mut n: u64) -> u32 {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// A log-linear histogram of `f64` mass per [`Bin`].
///
/// Buckets whose mass becomes exactly zero are dropped, so a histogram that
/// had everything cancelled out compares equal to a fresh one.
///
/// # Examples
///
/// ```rust
/// use hmsketch::histogram::{Histogram, LogLinear};
///
/// let mut a = LogLinear::new(2);
/// a.insert(12.4, 2.0);
/// let mut b = LogLinear::new(2);
/// b.insert(12.0, 1.0);
///
/// assert_eq!(a.combine(&b).read(12.4), 3.0);
/// assert_eq!(a.min(&b).read(12.4), 1.0);
/// assert_eq!(a.cancel(&b).read(12.4), 1.0);
/// ```
///
/// Decoding is checked: the resolution must be in `1..=MAX_RESOLUTION`, every
/// bin must [fit](Bin::fits) that resolution and bins must be strictly
/// ascending, as they are always written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EncodedLogLinear")]
pub struct LogLinear {
    resolution: u32,
    #[serde(serialize_with = "bins_as_pairs")]
    bins: BTreeMap<Bin, f64>,
}

/// Serializes the bin map as a sequence of `(bin, mass)` pairs so that
/// formats with string-only map keys (JSON) can carry it too.
fn bins_as_pairs<S: serde::Serializer>(
    bins: &BTreeMap<Bin, f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(bins.iter())
}

/// Wire form of [`LogLinear`], checked before it becomes one.
#[derive(Deserialize)]
struct EncodedLogLinear {
    resolution: u32,
    bins: Vec<(Bin, f64)>,
}

impl TryFrom<EncodedLogLinear> for LogLinear {
    type Error = String;

    fn try_from(encoded: EncodedLogLinear) -> std::result::Result<Self, String> {
        let resolution = encoded.resolution;
        if !(1..=MAX_RESOLUTION).contains(&resolution) {
            return Err(format!(
                "histogram resolution {} outside 1..={}",
                resolution, MAX_RESOLUTION
            ));
        }
        if let Some((bin, _)) = encoded.bins.iter().find(|(bin, _)| !bin.fits(resolution)) {
            return Err(format!(
                "bin {:?} does not fit resolution {}",
                bin, resolution
            ));
        }
        if encoded.bins.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
            return Err("histogram bins are not strictly ascending".to_string());
        }
        Ok(LogLinear {
            resolution,
            bins: encoded.bins.into_iter().collect(),
        })
    }
}

impl LogLinear {
    /// Iterates over `(bin, mass)` pairs in ascending bin order.
    pub fn bins(&self) -> impl Iterator<Item = (Bin, f64)> + '_ {
        self.bins.iter().map(|(bin, mass)| (*bin, *mass))
    }

    /// Number of non-empty buckets.
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Returns `true` if no bucket holds any mass.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Mass-weighted mean of the bucket midpoints, ignoring non-finite values.
    ///
    /// Returns `None` when there is no finite mass.
    pub fn mean(&self) -> Option<f64> {
        let (weighted, mass) = self
            .bins
            .iter()
            .filter(|(bin, _)| !bin.is_nan())
            .fold((0.0, 0.0), |(sum, total), (bin, mass)| {
                (sum + bin.midpoint() * mass, total + mass)
            });
        if mass == 0.0 {
            None
        } else {
            Some(weighted / mass)
        }
    }

    /// Estimates the `q`-quantile by linear interpolation inside the bucket
    /// where the cumulative mass crosses `q * total`.
    ///
    /// Returns `Ok(None)` when there is no positive finite mass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuantileOutOfBounds`] if `q` is outside `[0, 1]`.
    pub fn quantile(&self, q: f64) -> Result<Option<f64>> {
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::QuantileOutOfBounds);
        }
        let finite: Vec<(Bin, f64)> = self.bins().filter(|(bin, _)| !bin.is_nan()).collect();
        let total: f64 = finite.iter().map(|(_, mass)| mass).sum();
        if total <= 0.0 {
            return Ok(None);
        }

        let target = q * total;
        let mut cumulative = 0.0;
        for (bin, mass) in &finite {
            if *mass <= 0.0 {
                continue;
            }
            if cumulative + mass >= target {
                let fraction = ((target - cumulative) / mass).clamp(0.0, 1.0);
                let (lo, hi) = (bin.lower_bound(), bin.upper_bound());
                return Ok(Some(lo + (hi - lo) * fraction));
            }
            cumulative += mass;
        }
        Ok(finite.last().map(|(bin, _)| bin.upper_bound()))
    }

    fn bin_of(&self, value: f64) -> Bin {
        Bin::of(value, self.resolution)
    }

    /// Applies `op` bucket by bucket over the union of both bucket sets,
    /// treating a missing bucket as zero mass.
    fn merge_with(&self, other: &Self, op: impl Fn(f64, f64) -> f64) -> Self {
        let mut bins = BTreeMap::new();
        for (bin, mass) in &self.bins {
            let merged = op(*mass, other.bins.get(bin).copied().unwrap_or(0.0));
            if merged != 0.0 {
                bins.insert(*bin, merged);
            }
        }
        for (bin, mass) in &other.bins {
            if self.bins.contains_key(bin) {
                continue;
            }
            let merged = op(0.0, *mass);
            if merged != 0.0 {
                bins.insert(*bin, merged);
            }
        }
        LogLinear {
            resolution: self.resolution,
            bins,
        }
    }
}

impl Default for LogLinear {
    fn default() -> Self {
        <Self as Histogram>::new(crate::registry::DEFAULT_RESOLUTION)
    }
}

impl Histogram for LogLinear {
    /// Creates an empty histogram. Resolution is clamped to `1..=MAX_RESOLUTION`.
    fn new(resolution: u32) -> Self {
        LogLinear {
            resolution: resolution.clamp(1, MAX_RESOLUTION),
            bins: BTreeMap::new(),
        }
    }

    fn insert(&mut self, value: f64, count: f64) {
        if count == 0.0 {
            return;
        }
        let bin = self.bin_of(value);
        let mass = self.bins.entry(bin).or_insert(0.0);
        *mass += count;
        if *mass == 0.0 {
            self.bins.remove(&bin);
        }
    }

    fn combine(&self, other: &Self) -> Self {
        self.merge_with(other, |a, b| a + b)
    }

    fn cancel(&self, other: &Self) -> Self {
        self.merge_with(other, |a, b| a - b)
    }

    fn min(&self, other: &Self) -> Self {
        self.merge_with(other, f64::min)
    }

    fn total(&self) -> f64 {
        self.bins.values().sum()
    }

    fn read(&self, value: f64) -> f64 {
        self.bins.get(&self.bin_of(value)).copied().unwrap_or(0.0)
    }

    fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Moves each bucket's mass to the bucket holding its midpoint at the
    /// new resolution. Exact when coarsening.
    fn rescale(&self, resolution: u32) -> Self {
        let mut rescaled = <Self as Histogram>::new(resolution);
        if rescaled.resolution == self.resolution {
            return self.clone();
        }
        for (bin, mass) in &self.bins {
            let value = if bin.is_nan() {
                f64::NAN
            } else {
                bin.midpoint()
            };
            rescaled.insert(value, *mass);
        }
        rescaled
    }
}
