//! Opaque handles to segments and synapses.
//!
//! A handle names one specific entity instance. Slots in the store are
//! recycled, so every handle also carries a stamp that the store checks
//! against the slot's current occupant:
//!
//! - a [`Segment`] carries its flat index, which is never issued twice;
//! - a [`Synapse`] carries the slot generation, bumped on every destroy.
//!
//! Both also carry the store epoch, which changes whenever the store's
//! contents are replaced wholesale by a load, since slot numbers, flat
//! indices and generations restart from zero at that point.
//!
//! A handle whose stamp no longer matches is rejected rather than silently
//! resolving to an unrelated, newer entity.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle to a dendrite segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    slot: u32,
    flat: u32,
    epoch: u32,
}

impl Segment {
    #[inline]
    pub(crate) const fn new(slot: u32, flat: u32, epoch: u32) -> Self {
        Self { slot, flat, epoch }
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.slot as usize
    }

    /// Dense index of this segment, used to address per-segment arrays such
    /// as the buffers filled by activity computation.
    ///
    /// Always below `segment_flat_list_length()` of the store that issued it.
    #[inline]
    #[must_use]
    pub const fn flat_idx(self) -> usize {
        self.flat as usize
    }

    #[inline]
    pub(crate) const fn epoch(self) -> u32 {
        self.epoch
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment#{}@{}", self.flat, self.slot)
    }
}

/// Handle to a synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Synapse {
    slot: u32,
    generation: u32,
    epoch: u32,
}

impl Synapse {
    #[inline]
    pub(crate) const fn new(slot: u32, generation: u32, epoch: u32) -> Self {
        Self {
            slot,
            generation,
            epoch,
        }
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.slot as usize
    }

    #[inline]
    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) const fn epoch(self) -> u32 {
        self.epoch
    }
}

impl fmt::Display for Synapse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "synapse#{}.{}", self.slot, self.generation)
    }
}
