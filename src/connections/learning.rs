//! Learning operations: permanence updates on a single segment.
//!
//! None of these create synapses, and only
//! [`destroy_min_permanence_synapses`](Connections::destroy_min_permanence_synapses)
//! destroys any. Every permanence write is clamped to `[0, 1]`.

use super::Connections;
use crate::error::Result;
use crate::types::{clamp_permanence, CellIdx, Permanence, Segment, Synapse, SynapseIdx};

use ahash::AHashSet;
use smallvec::SmallVec;

impl Connections {
    /// Adapts a segment based on active inputs.
    ///
    /// Increases permanence for synapses connected to active inputs,
    /// decreases for those connected to inactive inputs. A handler
    /// notification is sent only for synapses whose permanence changed.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn adapt_segment<I>(
        &mut self,
        segment: Segment,
        active_presynaptic_cells: I,
        increment: Permanence,
        decrement: Permanence,
    ) -> Result<()>
    where
        I: IntoIterator<Item = CellIdx>,
    {
        let synapses = self.live_synapses(segment)?;
        let active_inputs: AHashSet<CellIdx> = active_presynaptic_cells.into_iter().collect();

        for synapse in synapses {
            let data = self.synapses[synapse.slot()].data;
            let delta = if active_inputs.contains(&data.presynaptic_cell) {
                increment
            } else {
                -decrement
            };

            let new_perm = clamp_permanence(data.permanence + delta);
            if new_perm != data.permanence {
                self.set_permanence(synapse, new_perm);
            }
        }

        Ok(())
    }

    /// Uniformly adjusts all permanences on a segment.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn bump_segment(&mut self, segment: Segment, delta: Permanence) -> Result<()> {
        for synapse in self.live_synapses(segment)? {
            let old_perm = self.synapses[synapse.slot()].data.permanence;
            let new_perm = clamp_permanence(old_perm + delta);
            if new_perm != old_perm {
                self.set_permanence(synapse, new_perm);
            }
        }
        Ok(())
    }

    /// Counts the synapses on a segment with permanence at or above `threshold`.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn num_connected_synapses(
        &self,
        segment: Segment,
        threshold: Permanence,
    ) -> Result<SynapseIdx> {
        Ok(self
            .synapses_for_segment(segment)?
            .iter()
            .filter(|&&s| self.synapses[s.slot()].data.permanence >= threshold)
            .count() as SynapseIdx)
    }

    /// Raises permanences until the segment has at least `min_connected`
    /// synapses at or above the store's connected threshold.
    ///
    /// The strongest unconnected synapses are raised first, each exactly to
    /// the threshold. Returns the resulting connected count, which is below
    /// `min_connected` only if the segment has too few synapses.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn raise_permanences_to_threshold(
        &mut self,
        segment: Segment,
        min_connected: SynapseIdx,
    ) -> Result<SynapseIdx> {
        let threshold = self.connected_threshold;
        let current = self.num_connected_synapses(segment, threshold)?;
        if current >= min_connected {
            return Ok(current);
        }

        let mut unconnected: Vec<(Synapse, Permanence)> = self
            .synapses_for_segment(segment)?
            .iter()
            .map(|&s| (s, self.synapses[s.slot()].data.permanence))
            .filter(|&(_, perm)| perm < threshold)
            .collect();

        // Strongest first; stable, so ties keep creation order.
        unconnected.sort_by(|a, b| b.1.total_cmp(&a.1));

        let needed = (min_connected - current) as usize;
        let raised = unconnected.len().min(needed);
        for &(synapse, _) in &unconnected[..raised] {
            self.set_permanence(synapse, threshold);
        }

        Ok(current + raised as SynapseIdx)
    }

    /// Destroys the `n_destroy` synapses with the lowest permanences.
    ///
    /// Synapses whose presynaptic cell is in `exclude_cells` are never
    /// destroyed. Ties are broken by creation order. Returns the number of
    /// synapses destroyed.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn destroy_min_permanence_synapses(
        &mut self,
        segment: Segment,
        n_destroy: usize,
        exclude_cells: &[CellIdx],
    ) -> Result<usize> {
        let synapses = self.live_synapses(segment)?;
        if n_destroy == 0 {
            return Ok(0);
        }

        let exclude_set: AHashSet<CellIdx> = exclude_cells.iter().copied().collect();

        let mut candidates: Vec<(Synapse, Permanence)> = synapses
            .into_iter()
            .filter_map(|s| {
                let data = &self.synapses[s.slot()].data;
                (!exclude_set.contains(&data.presynaptic_cell)).then_some((s, data.permanence))
            })
            .collect();

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut destroyed = 0;
        for (synapse, _) in candidates.into_iter().take(n_destroy) {
            self.destroy_synapse(synapse)?;
            destroyed += 1;
        }
        Ok(destroyed)
    }

    /// Snapshot of a segment's synapse list, safe to iterate while mutating.
    fn live_synapses(&self, segment: Segment) -> Result<SmallVec<[Synapse; 32]>> {
        Ok(SmallVec::from_slice(self.synapses_for_segment(segment)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectionsParams;
    use crate::types::EPSILON;

    fn perm(conn: &Connections, synapse: Synapse) -> Permanence {
        conn.data_for_synapse(synapse).unwrap().permanence
    }

    #[test]
    fn test_adapt_segment() {
        let mut conn = Connections::with_cells(100);

        let seg = conn.create_segment(10).unwrap();
        let syn1 = conn.create_synapse(seg, 50, 0.5).unwrap();
        let syn2 = conn.create_synapse(seg, 51, 0.5).unwrap();

        conn.adapt_segment(seg, [50], 0.1, 0.1).unwrap();

        // syn1 should increase (presynaptic cell 50 is active)
        assert!((perm(&conn, syn1) - 0.6).abs() < EPSILON);

        // syn2 should decrease (presynaptic cell 51 is inactive)
        assert!((perm(&conn, syn2) - 0.4).abs() < EPSILON);
    }

    #[test]
    fn test_adapt_segment_floor_and_ceiling() {
        let mut conn = Connections::with_cells(4);
        let seg = conn.create_segment(2).unwrap();
        let weak = conn.create_synapse(seg, 2, 0.004).unwrap();
        let strong = conn.create_synapse(seg, 6, 0.91).unwrap();

        conn.adapt_segment(seg, [0, 3, 4, 6], 0.1, 0.01).unwrap();

        assert_eq!(perm(&conn, weak), 0.0);
        assert_eq!(perm(&conn, strong), 1.0);
        assert_eq!(conn.num_synapses(), 2);
    }

    #[test]
    fn test_adapt_segment_invalid_handle() {
        let mut conn = Connections::with_cells(4);
        let seg = conn.create_segment(2).unwrap();
        conn.destroy_segment(seg).unwrap();
        assert!(conn.adapt_segment(seg, [0], 0.1, 0.1).is_err());
    }

    #[test]
    fn test_bump_segment() {
        let mut conn = Connections::with_cells(100);
        let seg = conn.create_segment(10).unwrap();
        conn.create_synapse(seg, 50, 0.5).unwrap();
        conn.create_synapse(seg, 51, 0.95).unwrap();

        conn.bump_segment(seg, 0.1).unwrap();

        let perms: Vec<Permanence> = conn
            .synapses_for_segment(seg)
            .unwrap()
            .iter()
            .map(|&s| perm(&conn, s))
            .collect();
        assert!((perms[0] - 0.6).abs() < EPSILON);
        assert_eq!(perms[1], 1.0);
    }

    #[test]
    fn test_num_connected_synapses() {
        let mut conn = Connections::with_cells(100);
        let seg = conn.create_segment(10).unwrap();
        conn.create_synapse(seg, 50, 0.6).unwrap(); // Connected
        conn.create_synapse(seg, 51, 0.4).unwrap(); // Not connected
        conn.create_synapse(seg, 52, 0.5).unwrap(); // Connected (at threshold)

        assert_eq!(conn.num_connected_synapses(seg, 0.5).unwrap(), 2);
    }

    #[test]
    fn test_raise_permanences_to_threshold() {
        let mut conn = Connections::new(ConnectionsParams {
            num_cells: 100,
            connected_threshold: 0.5,
        })
        .unwrap();

        let seg = conn.create_segment(10).unwrap();
        let a = conn.create_synapse(seg, 50, 0.4).unwrap();
        let b = conn.create_synapse(seg, 51, 0.3).unwrap();
        let c = conn.create_synapse(seg, 52, 0.2).unwrap();

        assert_eq!(conn.raise_permanences_to_threshold(seg, 2).unwrap(), 2);

        // Top 2 unconnected synapses are now exactly at threshold.
        assert!((perm(&conn, a) - 0.5).abs() < EPSILON);
        assert!((perm(&conn, b) - 0.5).abs() < EPSILON);
        assert!((perm(&conn, c) - 0.2).abs() < EPSILON);

        // Asking for more than the segment holds connects everything.
        assert_eq!(conn.raise_permanences_to_threshold(seg, 10).unwrap(), 3);
    }

    #[test]
    fn test_destroy_min_permanence_synapses() {
        let mut conn = Connections::with_cells(100);
        let seg = conn.create_segment(10).unwrap();
        let a = conn.create_synapse(seg, 50, 0.1).unwrap();
        let b = conn.create_synapse(seg, 51, 0.3).unwrap();
        let c = conn.create_synapse(seg, 52, 0.05).unwrap();
        let d = conn.create_synapse(seg, 53, 0.2).unwrap();

        let destroyed = conn.destroy_min_permanence_synapses(seg, 2, &[52]).unwrap();

        assert_eq!(destroyed, 2);
        assert_eq!(conn.synapses_for_segment(seg).unwrap(), &[b, c]);
        assert!(!conn.is_valid_synapse(a));
        assert!(!conn.is_valid_synapse(d));
    }

    #[test]
    fn test_destroy_min_permanence_synapses_bounded_by_candidates() {
        let mut conn = Connections::with_cells(100);
        let seg = conn.create_segment(10).unwrap();
        conn.create_synapse(seg, 50, 0.1).unwrap();

        assert_eq!(conn.destroy_min_permanence_synapses(seg, 5, &[]).unwrap(), 1);
        assert_eq!(conn.destroy_min_permanence_synapses(seg, 0, &[]).unwrap(), 0);
        assert_eq!(conn.num_synapses(), 0);
    }
}
