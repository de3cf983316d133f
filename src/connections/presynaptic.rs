//! Reverse index from presynaptic cell to the synapses that target it.

use crate::types::{CellIdx, Synapse};

use ahash::AHashMap;

/// Maps presynaptic cell -> live synapses targeting that cell.
///
/// Buckets are unordered. Each synapse remembers its position in its bucket
/// so removal is a `swap_remove`; the caller patches the position of the
/// synapse that was moved into the hole.
#[derive(Debug, Clone, Default)]
pub(super) struct PresynapticIndex {
    synapses_for_cell: AHashMap<CellIdx, Vec<Synapse>>,
}

impl PresynapticIndex {
    /// Adds `synapse` under `cell` and returns its position in the bucket.
    pub fn insert(&mut self, cell: CellIdx, synapse: Synapse) -> usize {
        let bucket = self.synapses_for_cell.entry(cell).or_default();
        bucket.push(synapse);
        bucket.len() - 1
    }

    /// Removes the synapse at `index` under `cell`.
    ///
    /// Returns the synapse that now occupies `index`, if any.
    pub fn remove(&mut self, cell: CellIdx, index: usize) -> Option<Synapse> {
        let bucket = self.synapses_for_cell.get_mut(&cell)?;
        if index >= bucket.len() {
            return None;
        }

        bucket.swap_remove(index);
        let moved = bucket.get(index).copied();

        if bucket.is_empty() {
            self.synapses_for_cell.remove(&cell);
        }
        moved
    }

    /// Returns the synapses targeting `cell`.
    pub fn synapses(&self, cell: CellIdx) -> &[Synapse] {
        self.synapses_for_cell
            .get(&cell)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of presynaptic cells with at least one synapse.
    #[cfg(test)]
    pub fn num_cells(&self) -> usize {
        self.synapses_for_cell.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_returns_position() {
        let mut index = PresynapticIndex::default();
        assert_eq!(index.insert(4, Synapse::new(0, 0, 0)), 0);
        assert_eq!(index.insert(4, Synapse::new(1, 0, 0)), 1);
        assert_eq!(index.insert(9, Synapse::new(2, 0, 0)), 0);
        assert_eq!(index.num_cells(), 2);
    }

    #[test]
    fn test_remove_reports_moved_synapse() {
        let mut index = PresynapticIndex::default();
        index.insert(4, Synapse::new(0, 0, 0));
        index.insert(4, Synapse::new(1, 0, 0));
        index.insert(4, Synapse::new(2, 0, 0));

        assert_eq!(index.remove(4, 0), Some(Synapse::new(2, 0, 0)));
        assert_eq!(index.synapses(4), &[Synapse::new(2, 0, 0), Synapse::new(1, 0, 0)]);

        // Removing the tail moves nothing.
        assert_eq!(index.remove(4, 1), None);
        assert_eq!(index.synapses(4), &[Synapse::new(2, 0, 0)]);
    }

    #[test]
    fn test_empty_bucket_dropped() {
        let mut index = PresynapticIndex::default();
        index.insert(4, Synapse::new(0, 0, 0));
        index.remove(4, 0);

        assert_eq!(index.num_cells(), 0);
        assert!(index.synapses(4).is_empty());
        assert_eq!(index.remove(4, 0), None);
    }
}
