//! Whole-registry snapshots.
//!
//! A registry serializes as one unit: its resolution, slot counter, the full
//! hash index and the ordered histogram list. [`Registry::serialize`] turns
//! that into an opaque binary blob (bincode, fixed-width integers) and
//! [`Registry::deserialize`] turns it back, rejecting anything truncated,
//! malformed, followed by trailing bytes, or structurally inconsistent.
//!
//! The intermediate [`RegistrySnapshot`] is a plain serde type, so callers
//! that want another encoding can take a snapshot and hand it to any
//! serde-compatible format themselves.
//!
//! # Examples
//!
//! ```rust
//! use hmsketch::Registry;
//!
//! let registry = Registry::new(2);
//! registry.insert([("job", "api")], 10.4, 3.0);
//!
//! let bytes = registry.serialize()?;
//! let restored: Registry = Registry::deserialize(&bytes)?;
//!
//! assert_eq!(restored.total_count(), 3.0);
//! assert_eq!(restored.count([("job", "api")]), 3.0);
//! # Ok::<(), hmsketch::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::hash::global_id;
use crate::histogram::Histogram;
use crate::registry::{Registry, Slots};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Format version written at the head of every snapshot.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Serializable image of a [`Registry`].
///
/// `index` is sorted by hash identifier so that equal registries produce
/// identical bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrySnapshot<H> {
    /// Snapshot format version.
    pub version: u16,
    /// Registry name (may be empty).
    pub name: String,
    /// Resolution forwarded to every histogram.
    pub resolution: u32,
    /// Number of allocated slots.
    pub slot_count: u64,
    /// `(hash id, slot)` pairs.
    pub index: Vec<(i64, u64)>,
    /// Histograms in slot order.
    pub registers: Vec<H>,
}

impl<H: Histogram> RegistrySnapshot<H> {
    /// Checks the snapshot describes a registry that could actually exist.
    ///
    /// Every slot must be addressed by exactly one identifier, the global
    /// identifier must be present, the resolution must be one the histogram
    /// type accepts as is, and every histogram must have been built with it.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(inconsistent(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }

        let len = self.registers.len();
        if self.slot_count != len as u64 {
            return Err(inconsistent(format!(
                "slot count {} does not match {} histograms",
                self.slot_count, len
            )));
        }
        if self.index.len() != len {
            return Err(inconsistent(format!(
                "{} index entries for {} histograms",
                self.index.len(),
                len
            )));
        }

        let mut ids = HashMap::with_capacity(len);
        let mut claimed = vec![false; len];
        for &(id, slot) in &self.index {
            if slot >= len as u64 {
                return Err(inconsistent(format!(
                    "index entry {} points at slot {} of {}",
                    id, slot, len
                )));
            }
            if ids.insert(id, slot).is_some() {
                return Err(inconsistent(format!("duplicate index entry {}", id)));
            }
            let slot = slot as usize;
            if claimed[slot] {
                return Err(inconsistent(format!("slot {} addressed twice", slot)));
            }
            claimed[slot] = true;
        }

        if !ids.contains_key(&global_id()) {
            return Err(inconsistent("missing global slot".to_string()));
        }

        let expected = H::new(self.resolution).resolution();
        if expected != self.resolution {
            return Err(inconsistent(format!(
                "registry resolution {} is not a valid histogram resolution",
                self.resolution
            )));
        }
        if let Some(slot) = self
            .registers
            .iter()
            .position(|h| h.resolution() != expected)
        {
            return Err(inconsistent(format!(
                "histogram in slot {} has resolution {}, expected {}",
                slot,
                self.registers[slot].resolution(),
                expected
            )));
        }

        Ok(())
    }
}

fn inconsistent(reason: String) -> Error {
    debug!(%reason, "rejecting snapshot");
    Error::Inconsistent(reason)
}

impl<H: Histogram> TryFrom<RegistrySnapshot<H>> for Registry<H> {
    type Error = Error;

    fn try_from(snapshot: RegistrySnapshot<H>) -> Result<Self> {
        snapshot.validate()?;
        let index = snapshot
            .index
            .into_iter()
            .map(|(id, slot)| (id, slot as usize))
            .collect();
        let slots = Slots {
            index,
            registers: snapshot.registers,
        };
        Ok(Registry::from_parts(snapshot.name, snapshot.resolution, slots))
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

impl<H: Histogram> Registry<H> {
    /// Takes a consistent snapshot of the registry under its lock.
    pub fn snapshot(&self) -> RegistrySnapshot<H> {
        let slots = self.lock();
        let mut index: Vec<(i64, u64)> = slots
            .index
            .iter()
            .map(|(&id, &slot)| (id, slot as u64))
            .collect();
        index.sort_unstable();

        RegistrySnapshot {
            version: SNAPSHOT_VERSION,
            name: self.name.clone(),
            resolution: self.resolution,
            slot_count: slots.registers.len() as u64,
            index,
            registers: slots.registers.clone(),
        }
    }

    /// Encodes the whole registry as an opaque binary blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the histogram type fails to serialize.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let snapshot = self.snapshot();
        let bytes = codec().serialize(&snapshot).map_err(Error::Encode)?;
        debug!(
            slots = snapshot.slot_count,
            bytes = bytes.len(),
            "serialized registry"
        );
        Ok(bytes)
    }

    /// Decodes a registry produced by [`Registry::serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for truncated, malformed or over-long input,
    /// and [`Error::Inconsistent`] when the decoded structure violates the
    /// registry invariants. Nothing is constructed on failure.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let snapshot: RegistrySnapshot<H> = codec().deserialize(bytes).map_err(|err| {
            debug!(bytes = bytes.len(), error = %err, "failed to decode snapshot");
            Error::Decode(err)
        })?;
        Registry::try_from(snapshot)
    }
}
