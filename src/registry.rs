//! The labeled histogram registry.
//!
//! A [`Registry`] keeps one *marginal* histogram per `key=value` label
//! dimension it has ever seen, plus a global histogram over every
//! observation. Storing one histogram per label *combination* would grow
//! combinatorially; storing marginals grows linearly with the number of
//! distinct label pairs, at the price of answering conjunction queries
//! approximately.
//!
//! # Layout
//!
//! ```text
//!            index (hash id -> slot)            registers
//!   hash("__global__","__global__") ──► 0 ──►  [ global histogram      ]
//!   hash("job","api")              ──► 1 ──►  [ marginal of job=api   ]
//!   hash("region","eu")            ──► 2 ──►  [ marginal of region=eu ]
//!   hash("job","batch")            ──► 3 ──►  [ marginal of job=batch ]
//! ```
//!
//! Slots are appended and never removed, so the slot count equals the number
//! of distinct label pairs ever observed plus one. There is no eviction: plan
//! capacity around label cardinality, not around observation volume.
//!
//! # Insert and query
//!
//! `insert` fans an observation out to the global slot and to the slot of
//! every label pair it carries. `sketch` fans back in: it starts from the
//! global histogram and narrows it with the per-bucket minimum of each
//! requested dimension. If any requested pair was never observed the
//! conjunction has no support and an empty histogram comes back.
//!
//! # Concurrency
//!
//! One mutex guards the `(index, registers)` pair, so allocating a slot and
//! appending its histogram happen as a unit. Every operation holds it for its
//! whole duration. [`combine`](Registry::combine) and
//! [`cancel`](Registry::cancel) lock both operands in address order, which
//! keeps `a.combine(&b)` racing `b.combine(&a)` deadlock free.
//!
//! # Example
//!
//! ```rust
//! use hmsketch::Registry;
//! use std::collections::HashMap;
//!
//! let registry = Registry::new(2);
//! let labels: HashMap<&str, &str> = [("job", "api"), ("region", "eu")].into();
//!
//! registry.insert(&labels, 10.4, 1.0);
//! registry.insert(&labels, 45.4, 1.0);
//! registry.insert([("job", "api"), ("region", "us")], 12.4, 2.0);
//!
//! assert_eq!(registry.total_count(), 4.0);
//! assert_eq!(registry.count([("job", "api")]), 4.0);
//! assert_eq!(registry.count([("region", "eu")]), 2.0);
//! assert_eq!(registry.count([("region", "apac")]), 0.0);
//! ```

use crate::hash::{global_id, hash};
use crate::histogram::{Histogram, LogLinear};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Debug};
use tracing::{debug, trace, warn};

/// Resolution used by [`Registry::default`].
pub const DEFAULT_RESOLUTION: u32 = 2;

/// Hash index plus the histograms it addresses.
///
/// `registers.len()` is the slot counter: a slot is allocated by inserting
/// its id into `index` and pushing its histogram in the same critical section.
#[derive(Debug, Clone)]
pub(crate) struct Slots<H> {
    pub(crate) index: HashMap<i64, usize>,
    pub(crate) registers: Vec<H>,
}

impl<H: Histogram> Slots<H> {
    fn empty() -> Self {
        Slots {
            index: HashMap::new(),
            registers: Vec::new(),
        }
    }

    fn with_global(resolution: u32) -> Self {
        let mut slots = Self::empty();
        slots.push(global_id(), H::new(resolution));
        slots
    }

    fn get(&self, id: i64) -> Option<&H> {
        self.index.get(&id).and_then(|&slot| self.registers.get(slot))
    }

    /// Appends `histogram` as the next slot and addresses it by `id`.
    fn push(&mut self, id: i64, histogram: H) {
        self.index.insert(id, self.registers.len());
        self.registers.push(histogram);
    }

    /// Returns the histogram for `id`, allocating an empty one first if needed.
    fn get_or_allocate(&mut self, id: i64, resolution: u32) -> &mut H {
        let slot = match self.index.get(&id).copied() {
            Some(slot) => slot,
            None => {
                let slot = self.registers.len();
                trace!(id, slot, "allocating histogram slot");
                self.push(id, H::new(resolution));
                slot
            }
        };
        &mut self.registers[slot]
    }

    fn global(&self, resolution: u32) -> H {
        self.get(global_id())
            .cloned()
            .unwrap_or_else(|| H::new(resolution))
    }
}

/// A registry of marginal histograms addressed by hashed label dimensions.
///
/// `Registry` is `Send + Sync`; share it across threads with `Arc`.
/// The histogram type defaults to [`LogLinear`]; any type implementing
/// [`Histogram`] can be used through [`Registry::with_resolution`].
///
/// # Examples
///
/// Windowed counts by cancelling an earlier snapshot:
///
/// ```rust
/// use hmsketch::Registry;
///
/// let window_start = Registry::new(2);
/// window_start.insert([("job", "api")], 10.0, 5.0);
///
/// let during = Registry::new(2);
/// during.insert([("job", "api")], 10.0, 3.0);
///
/// let window_end = window_start.combine(&during);
/// let accrued = window_end.cancel(&window_start);
///
/// assert_eq!(accrued.total_count(), 3.0);
/// assert_eq!(accrued.count([("job", "api")]), 3.0);
/// ```
pub struct Registry<H = LogLinear> {
    pub(crate) name: String,
    pub(crate) resolution: u32,
    pub(crate) slots: Mutex<Slots<H>>,
}

impl Registry<LogLinear> {
    /// Creates an empty registry of [`LogLinear`] histograms.
    ///
    /// The only slot allocated up front is the global one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hmsketch::Registry;
    ///
    /// let registry = Registry::new(2);
    /// assert_eq!(registry.slot_count(), 1);
    /// assert_eq!(registry.total_count(), 0.0);
    /// ```
    pub fn new(resolution: u32) -> Self {
        Self::with_resolution(resolution)
    }
}

impl<H: Histogram> Registry<H> {
    /// Creates an empty registry for any histogram type.
    ///
    /// `resolution` is normalized the way the histogram type normalizes it,
    /// so the registry always reports the resolution its histograms carry.
    pub fn with_resolution(resolution: u32) -> Self {
        let resolution = H::new(resolution).resolution();
        Registry {
            name: String::new(),
            resolution,
            slots: Mutex::new(Slots::with_global(resolution)),
        }
    }

    pub(crate) fn from_parts(name: String, resolution: u32, slots: Slots<H>) -> Self {
        Registry {
            name,
            resolution,
            slots: Mutex::new(slots),
        }
    }

    /// Sets the name of this registry, returning `self` for method chaining.
    ///
    /// Observers use the name as the metric name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the name of this registry (empty if unnamed).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolution forwarded to every histogram.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Number of slots allocated so far, the global slot included.
    ///
    /// Never decreases.
    pub fn slot_count(&self) -> usize {
        self.lock().registers.len()
    }

    /// Returns `true` if the `key=value` dimension has been observed.
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.lock().index.contains_key(&hash(key, value))
    }

    /// Records `count` mass at `value` for the global histogram and for every
    /// label pair in `labels`.
    ///
    /// `labels` is any iterable of string-like pairs: a `HashMap`, a
    /// `BTreeMap`, an array of tuples or a [`Query`](crate::Query). A pair
    /// repeated in the same call is applied once.
    pub fn insert<I, K, V>(&self, labels: I, value: f64, count: f64)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut ids = vec![global_id()];
        for id in dimension_ids(labels) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut slots = self.lock();
        for id in ids {
            slots.get_or_allocate(id, self.resolution).insert(value, count);
        }
    }

    /// Merges two registries into a new one.
    ///
    /// Dimensions present in only one operand are carried over unchanged;
    /// dimensions present in both are combined. The result is equivalent to
    /// replaying every insert of both registries into one empty registry.
    ///
    /// The result has the receiver's resolution. Histograms from `other` are
    /// [rescaled](Histogram::rescale) first if the resolutions differ.
    pub fn combine(&self, other: &Self) -> Self {
        self.merge(other, "combine", |resolution, mine, theirs| match (mine, theirs) {
            (Some(a), Some(b)) => a.combine(b),
            (Some(a), None) => a.clone(),
            (None, Some(b)) => b.clone(),
            (None, None) => H::new(resolution),
        })
    }

    /// Subtracts `other` from this registry, returning a new one.
    ///
    /// Dimensions only `other` has become empty histograms cancelled against
    /// `other`'s, i.e. negative-only mass.
    pub fn cancel(&self, other: &Self) -> Self {
        self.merge(other, "cancel", |resolution, mine, theirs| match (mine, theirs) {
            (Some(a), Some(b)) => a.cancel(b),
            (Some(a), None) => a.clone(),
            (None, Some(b)) => H::new(resolution).cancel(b),
            (None, None) => H::new(resolution),
        })
    }

    /// Approximates the histogram of observations matching every pair in `labels`.
    ///
    /// An empty label set returns the global histogram. If any pair was
    /// never observed, returns an empty histogram.
    pub fn sketch<I, K, V>(&self, labels: I) -> H
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let ids = dimension_ids(labels);
        let slots = self.lock();
        let mut result = slots.global(self.resolution);
        for id in ids {
            match slots.get(id) {
                Some(marginal) => result = result.min(marginal),
                None => return H::new(self.resolution),
            }
        }
        result
    }

    /// Approximate number of observations matching every pair in `labels`.
    pub fn count<I, K, V>(&self, labels: I) -> f64
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.sketch(labels).total()
    }

    /// Total mass ever recorded, regardless of labels.
    pub fn total_count(&self) -> f64 {
        self.lock().global(self.resolution).total()
    }

    /// Returns a copy of the global histogram.
    pub fn global(&self) -> H {
        self.lock().global(self.resolution)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Slots<H>> {
        self.slots.lock()
    }

    /// Runs `f` with both operands' slots locked.
    ///
    /// Locks are taken in address order; a registry paired with itself is
    /// locked once.
    fn with_both<R>(&self, other: &Self, f: impl FnOnce(&Slots<H>, &Slots<H>) -> R) -> R {
        if std::ptr::eq(self, other) {
            let slots = self.lock();
            return f(&slots, &slots);
        }
        if (self as *const Self) < (other as *const Self) {
            let mine = self.lock();
            let theirs = other.lock();
            f(&mine, &theirs)
        } else {
            let theirs = other.lock();
            let mine = self.lock();
            f(&mine, &theirs)
        }
    }

    fn merge(
        &self,
        other: &Self,
        operation: &'static str,
        op: impl Fn(u32, Option<&H>, Option<&H>) -> H,
    ) -> Self {
        let rescale = self.resolution != other.resolution;
        if rescale {
            warn!(
                operation,
                left = self.resolution,
                right = other.resolution,
                "merging registries with different resolutions, rescaling the right operand"
            );
        }
        let resolution = self.resolution;
        let slots = self.with_both(other, |mine, theirs| {
            let ids: BTreeSet<i64> = mine.index.keys().chain(theirs.index.keys()).copied().collect();
            let mut out = Slots::empty();
            for id in ids {
                let rescaled = if rescale {
                    theirs.get(id).map(|h| h.rescale(resolution))
                } else {
                    None
                };
                let right = rescaled.as_ref().or_else(|| theirs.get(id));
                out.push(id, op(resolution, mine.get(id), right));
            }
            debug!(
                operation,
                left = mine.registers.len(),
                right = theirs.registers.len(),
                slots = out.registers.len(),
                "merged registries"
            );
            out
        });
        Registry::from_parts(self.name.clone(), resolution, slots)
    }
}

fn dimension_ids<I, K, V>(labels: I) -> Vec<i64>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    labels
        .into_iter()
        .map(|(key, value)| hash(key.as_ref(), value.as_ref()))
        .collect()
}

impl<H: Histogram> Default for Registry<H> {
    fn default() -> Self {
        Self::with_resolution(DEFAULT_RESOLUTION)
    }
}

impl<H: Histogram> Clone for Registry<H> {
    /// Takes a consistent copy of the slots under the lock.
    fn clone(&self) -> Self {
        Registry::from_parts(self.name.clone(), self.resolution, self.lock().clone())
    }
}

impl<H: Histogram> Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.lock();
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("resolution", &self.resolution)
            .field("slot_count", &slots.registers.len())
            .field("total_count", &slots.global(self.resolution).total())
            .finish()
    }
}
