//! Activity computation: per-segment overlap with a set of active cells.

use super::Connections;
use crate::error::{DendriteError, Result};
use crate::types::{CellIdx, Permanence, SynapseIdx};

impl Connections {
    /// Computes segment activity given active presynaptic cells.
    ///
    /// For every synapse whose presynaptic cell is active, the potential count
    /// of its segment is incremented; the connected count is incremented too
    /// if the synapse permanence is at least `connected_permanence`.
    ///
    /// Both buffers are indexed by [`Segment::flat_idx`](crate::types::Segment::flat_idx)
    /// and accumulated into, so callers normally pass zero-filled buffers.
    /// Active cells may repeat or come in any order; each distinct cell is
    /// counted once. Cost is proportional to the number of synapses that
    /// target the active cells.
    ///
    /// # Errors
    ///
    /// Returns `DendriteError::InvalidParameter` if either buffer is shorter
    /// than [`segment_flat_list_length`](Self::segment_flat_list_length).
    pub fn compute_activity_into<I>(
        &self,
        num_active_connected: &mut [SynapseIdx],
        num_active_potential: &mut [SynapseIdx],
        active_presynaptic_cells: I,
        connected_permanence: Permanence,
    ) -> Result<()>
    where
        I: IntoIterator<Item = CellIdx>,
    {
        let len = self.segment_flat_list_length();
        if num_active_connected.len() < len || num_active_potential.len() < len {
            return Err(DendriteError::InvalidParameter {
                name: "activity buffers",
                message: format!(
                    "need at least {len} entries, got {} and {}",
                    num_active_connected.len(),
                    num_active_potential.len()
                ),
            });
        }

        self.accumulate_activity(
            num_active_connected,
            num_active_potential,
            &dedup(active_presynaptic_cells),
            connected_permanence,
        );
        Ok(())
    }

    /// Computes both connected and potential activity into fresh buffers.
    ///
    /// Returns `(num_active_connected, num_active_potential)`, each of length
    /// [`segment_flat_list_length`](Self::segment_flat_list_length).
    pub fn compute_activity<I>(
        &self,
        active_presynaptic_cells: I,
        connected_permanence: Permanence,
    ) -> (Vec<SynapseIdx>, Vec<SynapseIdx>)
    where
        I: IntoIterator<Item = CellIdx>,
    {
        let len = self.segment_flat_list_length();
        let mut num_active_connected = vec![0; len];
        let mut num_active_potential = vec![0; len];

        self.accumulate_activity(
            &mut num_active_connected,
            &mut num_active_potential,
            &dedup(active_presynaptic_cells),
            connected_permanence,
        );

        (num_active_connected, num_active_potential)
    }

    fn accumulate_activity(
        &self,
        num_active_connected: &mut [SynapseIdx],
        num_active_potential: &mut [SynapseIdx],
        active_cells: &[CellIdx],
        connected_permanence: Permanence,
    ) {
        for &cell in active_cells {
            for &synapse in self.presynaptic.synapses(cell) {
                let slot = &self.synapses[synapse.slot()];
                let flat = slot.segment.flat_idx();

                num_active_potential[flat] += 1;
                if slot.data.permanence >= connected_permanence {
                    num_active_connected[flat] += 1;
                }
            }
        }
    }
}

fn dedup<I: IntoIterator<Item = CellIdx>>(cells: I) -> Vec<CellIdx> {
    let mut cells: Vec<CellIdx> = cells.into_iter().collect();
    cells.sort_unstable();
    cells.dedup();
    cells
}
