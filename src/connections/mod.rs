//! Connections - The synaptic connectivity graph for HTM.
//!
//! [`Connections`] stores the segments owned by a fixed population of cells
//! and the synapses owned by those segments. It is the data structure that
//! Spatial Pooler and Temporal Memory style algorithms read and adapt on every
//! cycle.
//!
//! Storage is a pair of slot arenas (segments and synapses) with LIFO reuse of
//! destroyed slots. Handles are stamped so that a handle to a destroyed entity
//! is rejected even after its slot has been handed to a new entity. A reverse
//! index from presynaptic cell to synapses keeps activity computation
//! proportional to the size of the active input.
//!
//! The store is split across submodules by concern:
//!
//! - `topology`: creating and destroying segments and synapses
//! - `presynaptic`: the reverse index
//! - `activity`: overlap counting
//! - `learning`: permanence updates
//! - `events`: handler subscription and notification
//! - `persist`: save, load and snapshot encoding

mod activity;
mod events;
mod learning;
#[cfg(feature = "serde")]
mod persist;
mod presynaptic;
mod topology;

pub use events::{ConnectionsEventHandler, SubscriptionToken};

use crate::error::{DendriteError, Result};
use crate::types::{CellIdx, Permanence, Segment, SegmentIdx, Synapse, EPSILON};

use events::EventBroadcaster;
use presynaptic::PresynapticIndex;

use smallvec::SmallVec;
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Data associated with a synapse.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseData {
    /// The presynaptic cell this synapse connects to.
    pub presynaptic_cell: CellIdx,

    /// The permanence strength of this synapse.
    pub permanence: Permanence,
}

/// Segment slot in the arena.
#[derive(Debug, Clone)]
struct SegmentData {
    /// Live synapses on this segment, in creation order.
    synapses: SmallVec<[Synapse; 32]>,

    /// The cell this segment belongs to.
    cell: CellIdx,

    /// Flat index of the current occupant; doubles as the handle stamp.
    flat: u32,

    destroyed: bool,
}

impl SegmentData {
    fn new(cell: CellIdx, flat: u32) -> Self {
        Self {
            synapses: SmallVec::new(),
            cell,
            flat,
            destroyed: false,
        }
    }

    #[inline]
    fn is_live(&self, segment: Segment) -> bool {
        !self.destroyed && self.flat as usize == segment.flat_idx()
    }
}

/// Synapse slot in the arena.
#[derive(Debug, Clone)]
struct SynapseSlot {
    data: SynapseData,

    /// The segment this synapse belongs to.
    segment: Segment,

    /// Position in the presynaptic bucket (for O(1) removal).
    presynaptic_map_index: usize,

    /// Bumped on destroy so stale handles stop validating.
    generation: u32,

    destroyed: bool,
}

impl SynapseSlot {
    #[inline]
    fn is_live(&self, synapse: Synapse) -> bool {
        !self.destroyed && self.generation == synapse.generation()
    }
}

/// Data associated with a cell.
#[derive(Debug, Clone, Default)]
struct CellData {
    /// Live segments on this cell, in creation order.
    segments: SmallVec<[Segment; 8]>,
}

/// Parameters for creating a Connections instance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionsParams {
    /// Number of cells in the connections graph.
    pub num_cells: CellIdx,

    /// Permanence at or above which a synapse counts as connected, used by
    /// the threshold-relative learning helpers.
    pub connected_threshold: Permanence,
}

impl Default for ConnectionsParams {
    fn default() -> Self {
        Self {
            num_cells: 0,
            connected_threshold: 0.5,
        }
    }
}

/// The Connections class manages the synaptic connections between cells.
///
/// # Example
///
/// ```rust
/// use dendrite::connections::Connections;
///
/// let mut connections = Connections::with_cells(1024);
/// let segment = connections.create_segment(10)?;
/// let synapse = connections.create_synapse(segment, 50, 0.34)?;
///
/// assert_eq!(connections.cell_for_segment(segment)?, 10);
/// assert_eq!(connections.segment_for_synapse(synapse)?, segment);
/// assert_eq!(connections.data_for_synapse(synapse)?.presynaptic_cell, 50);
/// # Ok::<(), dendrite::DendriteError>(())
/// ```
#[derive(Debug)]
pub struct Connections {
    /// All cells in the connections graph.
    cells: Vec<CellData>,

    /// All segment slots (indexed by `Segment::slot`).
    segments: Vec<SegmentData>,

    /// Destroyed segment slots (available for reuse).
    destroyed_segments: Vec<u32>,

    /// All synapse slots (indexed by `Synapse::slot`).
    synapses: Vec<SynapseSlot>,

    /// Destroyed synapse slots (available for reuse).
    destroyed_synapses: Vec<u32>,

    /// Next flat index to hand out; flat indices are never reused.
    next_flat_idx: u32,

    /// Stamped into every handle; changes when `load` replaces the contents.
    epoch: u32,

    /// Permanence threshold for connected synapses.
    connected_threshold: Permanence,

    /// Presynaptic cell -> synapses targeting it.
    presynaptic: PresynapticIndex,

    /// Subscribed event handlers.
    events: EventBroadcaster,
}

impl Connections {
    /// Creates a new Connections instance with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`DendriteError::InvalidParameter`] if `connected_threshold`
    /// is not within `[0, 1]`.
    pub fn new(params: ConnectionsParams) -> Result<Self> {
        if !(0.0..=1.0).contains(&params.connected_threshold) {
            return Err(DendriteError::InvalidParameter {
                name: "connected_threshold",
                message: format!("must be within [0, 1], got {}", params.connected_threshold),
            });
        }

        Ok(Self {
            cells: vec![CellData::default(); params.num_cells as usize],
            segments: Vec::new(),
            destroyed_segments: Vec::new(),
            synapses: Vec::new(),
            destroyed_synapses: Vec::new(),
            next_flat_idx: 0,
            epoch: 0,
            connected_threshold: params.connected_threshold,
            presynaptic: PresynapticIndex::default(),
            events: EventBroadcaster::default(),
        })
    }

    /// Creates a Connections instance with default parameters.
    pub fn with_cells(num_cells: CellIdx) -> Self {
        Self {
            cells: vec![CellData::default(); num_cells as usize],
            ..Self::default()
        }
    }

    /// Returns the number of cells.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Returns the connected threshold.
    #[inline]
    pub fn connected_threshold(&self) -> Permanence {
        self.connected_threshold
    }

    /// Returns the number of segments (excluding destroyed).
    pub fn num_segments(&self) -> usize {
        self.segments.len() - self.destroyed_segments.len()
    }

    /// Returns the number of segments on a specific cell.
    ///
    /// # Errors
    ///
    /// Fails if `cell` is out of range.
    pub fn num_segments_on_cell(&self, cell: CellIdx) -> Result<usize> {
        Ok(self.segments_for_cell(cell)?.len())
    }

    /// Returns the number of synapses (excluding destroyed).
    pub fn num_synapses(&self) -> usize {
        self.synapses.len() - self.destroyed_synapses.len()
    }

    /// Returns the number of synapses on a specific segment.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn num_synapses_on_segment(&self, segment: Segment) -> Result<usize> {
        Ok(self.segment_data(segment)?.synapses.len())
    }

    /// Returns the flat list length for segment indexing.
    ///
    /// Every flat index ever issued is below this value. It only grows until
    /// the store is loaded from a snapshot.
    pub fn segment_flat_list_length(&self) -> usize {
        self.next_flat_idx as usize
    }

    /// Returns true if `segment` refers to a live segment of this store.
    pub fn is_valid_segment(&self, segment: Segment) -> bool {
        self.segment_data(segment).is_ok()
    }

    /// Returns true if `synapse` refers to a live synapse of this store.
    pub fn is_valid_synapse(&self, synapse: Synapse) -> bool {
        self.synapse_slot(synapse).is_ok()
    }

    // ========================================================================
    // Segment queries
    // ========================================================================

    /// Gets the segments for a cell, in creation order.
    ///
    /// # Errors
    ///
    /// Fails if `cell` is out of range.
    #[inline]
    pub fn segments_for_cell(&self, cell: CellIdx) -> Result<&[Segment]> {
        Ok(&self.cells[self.check_cell(cell)?].segments)
    }

    /// Gets the cell that owns a segment.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    #[inline]
    pub fn cell_for_segment(&self, segment: Segment) -> Result<CellIdx> {
        Ok(self.segment_data(segment)?.cell)
    }

    /// Gets the segment at a specific index on a cell.
    ///
    /// # Errors
    ///
    /// Fails if `cell` is out of range or `idx` is past the cell's segments.
    pub fn get_segment(&self, cell: CellIdx, idx: SegmentIdx) -> Result<Segment> {
        let segments = self.segments_for_cell(cell)?;
        segments
            .get(idx as usize)
            .copied()
            .ok_or(DendriteError::IndexOutOfBounds {
                index: idx as usize,
                size: segments.len(),
            })
    }

    /// Gets the index of a segment on its cell.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store, or with
    /// `IndexOutOfBounds` if its position does not fit in a [`SegmentIdx`].
    pub fn idx_on_cell_for_segment(&self, segment: Segment) -> Result<SegmentIdx> {
        let cell = self.segment_data(segment)?.cell;
        self.cells[cell as usize]
            .segments
            .iter()
            .position(|&s| s == segment)
            .ok_or(DendriteError::InvalidSegment(segment))
            .and_then(|pos| {
                SegmentIdx::try_from(pos).map_err(|_| DendriteError::IndexOutOfBounds {
                    index: pos,
                    size: usize::from(SegmentIdx::MAX) + 1,
                })
            })
    }

    /// Maps each segment to its owning cell, preserving order and duplicates.
    ///
    /// # Errors
    ///
    /// Fails on the first segment that is not live.
    pub fn map_segments_to_cells(&self, segments: &[Segment]) -> Result<Vec<CellIdx>> {
        segments
            .iter()
            .map(|&segment| self.cell_for_segment(segment))
            .collect()
    }

    /// Compares two segments by owning cell, then by position on the cell.
    ///
    /// # Errors
    ///
    /// Fails if either segment is not live.
    pub fn compare_segments(&self, a: Segment, b: Segment) -> Result<Ordering> {
        let cell_a = self.cell_for_segment(a)?;
        let cell_b = self.cell_for_segment(b)?;

        Ok(match cell_a.cmp(&cell_b) {
            Ordering::Equal => self
                .idx_on_cell_for_segment(a)?
                .cmp(&self.idx_on_cell_for_segment(b)?),
            other => other,
        })
    }

    // ========================================================================
    // Synapse queries
    // ========================================================================

    /// Gets the synapses on a segment, in creation order.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    #[inline]
    pub fn synapses_for_segment(&self, segment: Segment) -> Result<&[Synapse]> {
        Ok(&self.segment_data(segment)?.synapses)
    }

    /// Gets the segment that owns a synapse.
    ///
    /// # Errors
    ///
    /// Fails if `synapse` is not a live synapse of this store.
    #[inline]
    pub fn segment_for_synapse(&self, synapse: Synapse) -> Result<Segment> {
        Ok(self.synapse_slot(synapse)?.segment)
    }

    /// Gets the synapse data.
    ///
    /// # Errors
    ///
    /// Fails if `synapse` is not a live synapse of this store.
    #[inline]
    pub fn data_for_synapse(&self, synapse: Synapse) -> Result<&SynapseData> {
        Ok(&self.synapse_slot(synapse)?.data)
    }

    /// Gets the presynaptic cells for a segment, in synapse creation order.
    ///
    /// # Errors
    ///
    /// Fails if `segment` is not a live segment of this store.
    pub fn presynaptic_cells_for_segment(&self, segment: Segment) -> Result<Vec<CellIdx>> {
        Ok(self
            .segment_data(segment)?
            .synapses
            .iter()
            .map(|&s| self.synapses[s.slot()].data.presynaptic_cell)
            .collect())
    }

    /// Gets all live synapses from a presynaptic cell, in no particular order.
    pub fn synapses_for_presynaptic_cell(&self, cell: CellIdx) -> &[Synapse] {
        self.presynaptic.synapses(cell)
    }

    // ========================================================================
    // Handle validation
    // ========================================================================

    fn check_cell(&self, cell: CellIdx) -> Result<usize> {
        let index = cell as usize;
        if index < self.cells.len() {
            Ok(index)
        } else {
            Err(DendriteError::IndexOutOfBounds {
                index,
                size: self.cells.len(),
            })
        }
    }

    fn segment_data(&self, segment: Segment) -> Result<&SegmentData> {
        match self.segments.get(segment.slot()) {
            Some(data) if segment.epoch() == self.epoch && data.is_live(segment) => Ok(data),
            _ => Err(DendriteError::InvalidSegment(segment)),
        }
    }

    fn synapse_slot(&self, synapse: Synapse) -> Result<&SynapseSlot> {
        match self.synapses.get(synapse.slot()) {
            Some(slot) if synapse.epoch() == self.epoch && slot.is_live(synapse) => Ok(slot),
            _ => Err(DendriteError::InvalidSynapse(synapse)),
        }
    }

    fn synapses_equal(&self, segment: Segment, other: &Self, other_segment: Segment) -> bool {
        let ours = &self.segments[segment.slot()].synapses;
        let theirs = &other.segments[other_segment.slot()].synapses;

        ours.len() == theirs.len()
            && ours.iter().zip(theirs.iter()).all(|(&a, &b)| {
                let a = &self.synapses[a.slot()].data;
                let b = &other.synapses[b.slot()].data;
                a.presynaptic_cell == b.presynaptic_cell
                    && (a.permanence - b.permanence).abs() < EPSILON
            })
    }
}

impl Default for Connections {
    /// An empty store with no cells, suitable only as a `load` target.
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            segments: Vec::new(),
            destroyed_segments: Vec::new(),
            synapses: Vec::new(),
            destroyed_synapses: Vec::new(),
            next_flat_idx: 0,
            epoch: 0,
            connected_threshold: ConnectionsParams::default().connected_threshold,
            presynaptic: PresynapticIndex::default(),
            events: EventBroadcaster::default(),
        }
    }
}

/// Structural equality: same cell count, and per cell the live segments and
/// their live synapses match in order, with permanences compared within
/// [`EPSILON`]. Slot numbering, flat indices and subscribers are ignored.
impl PartialEq for Connections {
    fn eq(&self, other: &Self) -> bool {
        self.cells.len() == other.cells.len()
            && self.cells.iter().zip(&other.cells).all(|(a, b)| {
                a.segments.len() == b.segments.len()
                    && a.segments
                        .iter()
                        .zip(&b.segments)
                        .all(|(&sa, &sb)| self.synapses_equal(sa, other, sb))
            })
    }
}
