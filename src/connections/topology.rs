//! Creating and destroying segments and synapses.

use super::{CellData, Connections, SegmentData, SynapseData, SynapseSlot};
use crate::error::{DendriteError, Result};
use crate::types::{clamp_permanence, CellIdx, Permanence, Segment, Synapse};

use smallvec::SmallVec;
use tracing::trace;

impl Connections {
    // ========================================================================
    // Segment operations
    // ========================================================================

    /// Creates a new segment on the specified cell.
    ///
    /// The segment is appended to the cell's segment list and receives a flat
    /// index that has never been issued before.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::IndexOutOfBounds` if `cell` is out of range,
    /// or `DendriteError::CapacityExceeded` once flat indices or slots run out.
    pub fn create_segment(&mut self, cell: CellIdx) -> Result<Segment> {
        let cell_index = self.check_cell(cell)?;

        let flat = self.next_flat_idx;
        let next_flat = flat
            .checked_add(1)
            .ok_or(DendriteError::CapacityExceeded("segment flat indices"))?;

        let slot = if let Some(reuse) = self.destroyed_segments.pop() {
            self.segments[reuse as usize] = SegmentData::new(cell, flat);
            reuse
        } else {
            let slot = u32::try_from(self.segments.len())
                .map_err(|_| DendriteError::CapacityExceeded("segment slots"))?;
            self.segments.push(SegmentData::new(cell, flat));
            slot
        };
        self.next_flat_idx = next_flat;

        let segment = Segment::new(slot, flat, self.epoch);
        self.cells[cell_index].segments.push(segment);

        trace!(cell, %segment, "created segment");
        self.events.notify(|h| h.on_create_segment(segment));
        Ok(segment)
    }

    /// Destroys a segment and all its synapses.
    ///
    /// Each live synapse is destroyed (and announced) individually before the
    /// segment itself is removed from its cell and announced.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::InvalidSegment` if `segment` is not live.
    pub fn destroy_segment(&mut self, segment: Segment) -> Result<()> {
        let segment_data = self.segment_data(segment)?;
        let cell = segment_data.cell;
        let synapses: SmallVec<[Synapse; 32]> = segment_data.synapses.clone();

        for synapse in synapses {
            // Already-destroyed synapses are skipped, never destroyed twice.
            if self.synapses[synapse.slot()].is_live(synapse) {
                self.remove_synapse(synapse);
                self.events.notify(|h| h.on_destroy_synapse(synapse));
            }
        }

        remove_ordered(&mut self.cells[cell as usize], segment);

        let segment_data = &mut self.segments[segment.slot()];
        segment_data.destroyed = true;
        segment_data.synapses.clear();
        self.destroyed_segments.push(segment.slot() as u32);

        trace!(cell, %segment, "destroyed segment");
        self.events.notify(|h| h.on_destroy_segment(segment));
        Ok(())
    }

    // ========================================================================
    // Synapse operations
    // ========================================================================

    /// Creates a new synapse on a segment.
    ///
    /// The permanence is clamped to `[0, 1]`. The presynaptic cell is not
    /// range-checked: it may belong to a different (input) population.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::InvalidSegment` if `segment` is not live, or
    /// `DendriteError::CapacityExceeded` once synapse slots run out.
    pub fn create_synapse(
        &mut self,
        segment: Segment,
        presynaptic_cell: CellIdx,
        permanence: Permanence,
    ) -> Result<Synapse> {
        self.segment_data(segment)?;

        let data = SynapseData {
            presynaptic_cell,
            permanence: clamp_permanence(permanence),
        };

        let synapse = if let Some(reuse) = self.destroyed_synapses.pop() {
            let slot = &mut self.synapses[reuse as usize];
            slot.data = data;
            slot.segment = segment;
            slot.destroyed = false;
            Synapse::new(reuse, slot.generation, self.epoch)
        } else {
            let slot = u32::try_from(self.synapses.len())
                .map_err(|_| DendriteError::CapacityExceeded("synapse slots"))?;
            self.synapses.push(SynapseSlot {
                data,
                segment,
                presynaptic_map_index: 0,
                generation: 0,
                destroyed: false,
            });
            Synapse::new(slot, 0, self.epoch)
        };

        self.segments[segment.slot()].synapses.push(synapse);
        let map_index = self.presynaptic.insert(presynaptic_cell, synapse);
        self.synapses[synapse.slot()].presynaptic_map_index = map_index;

        trace!(%segment, %synapse, presynaptic_cell, "created synapse");
        self.events.notify(|h| h.on_create_synapse(synapse));
        Ok(synapse)
    }

    /// Destroys a synapse.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::InvalidSynapse` if `synapse` is not live.
    pub fn destroy_synapse(&mut self, synapse: Synapse) -> Result<()> {
        self.synapse_slot(synapse)?;
        self.remove_synapse(synapse);

        trace!(%synapse, "destroyed synapse");
        self.events.notify(|h| h.on_destroy_synapse(synapse));
        Ok(())
    }

    /// Updates a synapse's permanence value, clamped to `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::InvalidSynapse` if `synapse` is not live.
    pub fn update_synapse_permanence(
        &mut self,
        synapse: Synapse,
        permanence: Permanence,
    ) -> Result<()> {
        self.synapse_slot(synapse)?;
        self.set_permanence(synapse, clamp_permanence(permanence));
        Ok(())
    }

    /// Stores an already-clamped permanence on a live synapse and announces it.
    pub(super) fn set_permanence(&mut self, synapse: Synapse, permanence: Permanence) {
        self.synapses[synapse.slot()].data.permanence = permanence;
        self.events
            .notify(|h| h.on_update_synapse_permanence(synapse, permanence));
    }

    /// Unlinks a live synapse from its segment and the reverse index and
    /// retires its slot. Does not notify.
    fn remove_synapse(&mut self, synapse: Synapse) {
        let slot = &self.synapses[synapse.slot()];
        let segment = slot.segment;
        let presynaptic_cell = slot.data.presynaptic_cell;
        let map_index = slot.presynaptic_map_index;

        let segment_synapses = &mut self.segments[segment.slot()].synapses;
        if let Some(pos) = segment_synapses.iter().position(|&s| s == synapse) {
            segment_synapses.remove(pos);
        }

        if let Some(moved) = self.presynaptic.remove(presynaptic_cell, map_index) {
            self.synapses[moved.slot()].presynaptic_map_index = map_index;
        }

        let slot = &mut self.synapses[synapse.slot()];
        slot.destroyed = true;
        slot.generation = slot.generation.wrapping_add(1);
        self.destroyed_synapses.push(synapse.slot() as u32);
    }
}

fn remove_ordered(cell: &mut CellData, segment: Segment) {
    if let Some(pos) = cell.segments.iter().position(|&s| s == segment) {
        cell.segments.remove(pos);
    }
}
