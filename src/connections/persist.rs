//! Saving and loading [`Connections`] state.
//!
//! The persisted form is a snapshot holding a format version, the cell
//! count, the connected threshold, and for each cell its live segments in
//! creation order, each a list of `(presynaptic_cell, permanence)` records in
//! creation order. Destroyed entities, slot numbering and flat indices are not
//! persisted; loading replays creates into a fresh store.

use super::{Connections, ConnectionsParams, SynapseData};
use crate::error::{DendriteError, Result};
use crate::serialization::{Serializable, SerializableFormat};
use crate::types::CellIdx;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::io::{Read, Write};
use tracing::{debug, warn};

/// Current snapshot format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConnectionsSnapshot {
    version: u32,
    num_cells: CellIdx,
    connected_threshold: f32,
    /// cells -> segments -> synapses
    cells: Vec<Vec<Vec<SynapseData>>>,
}

impl Connections {
    fn snapshot(&self) -> ConnectionsSnapshot {
        let cells = self
            .cells
            .iter()
            .map(|cell| {
                cell.segments
                    .iter()
                    .map(|segment| {
                        self.segments[segment.slot()]
                            .synapses
                            .iter()
                            .map(|synapse| self.synapses[synapse.slot()].data)
                            .collect()
                    })
                    .collect()
            })
            .collect();

        ConnectionsSnapshot {
            version: FORMAT_VERSION,
            num_cells: self.cells.len() as CellIdx,
            connected_threshold: self.connected_threshold,
            cells,
        }
    }

    /// Rebuilds a store by replaying creates; handles are stamped with `epoch`.
    fn from_snapshot(snapshot: ConnectionsSnapshot, epoch: u32) -> Result<Self> {
        if snapshot.version != FORMAT_VERSION {
            return Err(DendriteError::VersionMismatch {
                found: snapshot.version,
                expected: FORMAT_VERSION,
            });
        }
        if snapshot.cells.len() != snapshot.num_cells as usize {
            return Err(DendriteError::CorruptState(format!(
                "header declares {} cells, body has {}",
                snapshot.num_cells,
                snapshot.cells.len()
            )));
        }

        let mut connections = Self::new(ConnectionsParams {
            num_cells: snapshot.num_cells,
            connected_threshold: snapshot.connected_threshold,
        })
        .map_err(|e| DendriteError::CorruptState(e.to_string()))?;
        connections.epoch = epoch;

        for (cell, segments) in snapshot.cells.into_iter().enumerate() {
            for synapses in segments {
                let segment = connections.create_segment(cell as CellIdx)?;
                for SynapseData {
                    presynaptic_cell,
                    permanence,
                } in synapses
                {
                    if !permanence.is_finite() {
                        return Err(DendriteError::CorruptState(format!(
                            "non-finite permanence {permanence} on cell {cell}"
                        )));
                    }
                    connections.create_synapse(segment, presynaptic_cell, permanence)?;
                }
            }
        }

        Ok(connections)
    }

    /// Saves the full state to a writer.
    ///
    /// # Errors
    ///
    /// Propagates encoding and I/O failures of the writer.
    pub fn save<W: Write>(&self, writer: W, format: SerializableFormat) -> Result<()> {
        self.snapshot().save(writer, format)?;
        debug!(
            num_cells = self.num_cells(),
            num_segments = self.num_segments(),
            num_synapses = self.num_synapses(),
            %format,
            "saved connections"
        );
        Ok(())
    }

    /// Replaces this store's topology with state read from a reader.
    ///
    /// The input is decoded and validated completely before anything is
    /// replaced, so on error the store is left untouched. Subscribed handlers
    /// are kept and are not notified of the loaded entities. The store epoch
    /// advances, so every handle issued before the load is rejected afterwards.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input, on an unsupported format
    /// version, or when the decoded state is structurally invalid.
    pub fn load<R: Read>(&mut self, reader: R, format: SerializableFormat) -> Result<()> {
        let epoch = self.epoch.wrapping_add(1);
        let loaded = ConnectionsSnapshot::load(reader, format)
            .and_then(|snapshot| Self::from_snapshot(snapshot, epoch))
            .map_err(|e| {
                warn!(error = %e, %format, "rejected connections state");
                e
            })?;

        let events = std::mem::take(&mut self.events);
        *self = loaded;
        self.events = events;

        debug!(
            num_cells = self.num_cells(),
            num_segments = self.num_segments(),
            num_synapses = self.num_synapses(),
            %format,
            "loaded connections"
        );
        Ok(())
    }
}

impl Serialize for Connections {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Connections {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let snapshot = ConnectionsSnapshot::deserialize(deserializer)?;
        Connections::from_snapshot(snapshot, 0).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectionsEventHandler;
    use crate::types::Segment;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample() -> Connections {
        let mut conn = Connections::with_cells(1024);

        let seg1 = conn.create_segment(10).unwrap();
        conn.create_synapse(seg1, 150, 0.85).unwrap();
        conn.create_synapse(seg1, 151, 0.15).unwrap();

        let seg2 = conn.create_segment(20).unwrap();
        conn.create_synapse(seg2, 80, 0.85).unwrap();
        let doomed = conn.create_synapse(seg2, 81, 0.85).unwrap();
        conn.create_synapse(seg2, 82, 0.15).unwrap();
        conn.destroy_synapse(doomed).unwrap();

        let seg3 = conn.create_segment(10).unwrap();
        conn.create_synapse(seg3, 400, 0.5).unwrap();
        conn.destroy_segment(seg3).unwrap();

        conn
    }

    fn save_bytes(conn: &Connections, format: SerializableFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        conn.save(&mut bytes, format).unwrap();
        bytes
    }

    #[test]
    fn test_save_load_binary() {
        let original = sample();
        let bytes = save_bytes(&original, SerializableFormat::Binary);

        let mut restored = Connections::default();
        restored.load(Cursor::new(bytes), SerializableFormat::Binary).unwrap();

        assert_eq!(original, restored);
        assert_eq!(restored.num_segments(), 2);
        assert_eq!(restored.num_synapses(), 4);
        assert_eq!(restored.segment_flat_list_length(), 2);
    }

    #[test]
    fn test_save_load_json() {
        let original = sample();
        let bytes = save_bytes(&original, SerializableFormat::Json);

        let mut restored = Connections::default();
        restored.load(Cursor::new(bytes), SerializableFormat::Json).unwrap();

        assert_eq!(original, restored);
    }

    #[test]
    fn test_loaded_reverse_index_is_rebuilt() {
        let original = sample();
        let bytes = save_bytes(&original, SerializableFormat::Binary);

        let mut restored = Connections::default();
        restored.load(Cursor::new(bytes), SerializableFormat::Binary).unwrap();

        let (connected, potential) = restored.compute_activity([80, 81, 82, 150, 151, 400], 0.5);
        let segs: Vec<Segment> = [10, 20]
            .iter()
            .map(|&cell| restored.segments_for_cell(cell).unwrap()[0])
            .collect();
        assert_eq!(connected[segs[0].flat_idx()], 1);
        assert_eq!(potential[segs[0].flat_idx()], 2);
        assert_eq!(connected[segs[1].flat_idx()], 1);
        assert_eq!(potential[segs[1].flat_idx()], 2);
        assert!(restored.synapses_for_presynaptic_cell(400).is_empty());
    }

    #[test]
    fn test_truncated_input_leaves_store_untouched() {
        let bytes = save_bytes(&sample(), SerializableFormat::Binary);

        let mut target = Connections::with_cells(8);
        let seg = target.create_segment(3).unwrap();
        target.create_synapse(seg, 1, 0.25).unwrap();

        let truncated = &bytes[..bytes.len() / 2];
        assert!(target
            .load(Cursor::new(truncated), SerializableFormat::Binary)
            .is_err());

        assert_eq!(target.num_cells(), 8);
        assert_eq!(target.num_synapses(), 1);
        assert!(target.is_valid_segment(seg));
    }

    #[test]
    fn test_version_mismatch() {
        let mut snapshot = sample().snapshot();
        snapshot.version = FORMAT_VERSION + 1;
        let bytes = snapshot.to_bytes(SerializableFormat::Binary).unwrap();

        let mut target = Connections::default();
        assert!(matches!(
            target.load(Cursor::new(bytes), SerializableFormat::Binary),
            Err(DendriteError::VersionMismatch { found, expected })
                if found == FORMAT_VERSION + 1 && expected == FORMAT_VERSION
        ));
    }

    #[test]
    fn test_cell_count_mismatch_is_corrupt() {
        let mut snapshot = sample().snapshot();
        snapshot.num_cells = 3;
        let bytes = snapshot.to_bytes(SerializableFormat::Binary).unwrap();

        let mut target = Connections::default();
        assert!(matches!(
            target.load(Cursor::new(bytes), SerializableFormat::Binary),
            Err(DendriteError::CorruptState(_))
        ));
    }

    #[test]
    fn test_non_finite_permanence_is_corrupt() {
        let mut snapshot = sample().snapshot();
        snapshot.cells[10][0][0].permanence = f32::NAN;
        let bytes = snapshot.to_bytes(SerializableFormat::Binary).unwrap();

        let mut target = Connections::default();
        assert!(matches!(
            target.load(Cursor::new(bytes), SerializableFormat::Binary),
            Err(DendriteError::CorruptState(_))
        ));
    }

    #[test]
    fn test_load_invalidates_prior_handles() {
        let mut target = Connections::with_cells(16);
        let old_segment = target.create_segment(5).unwrap();
        let old_synapse = target.create_synapse(old_segment, 3, 0.4).unwrap();

        let mut other = Connections::with_cells(16);
        let segment = other.create_segment(5).unwrap();
        other.create_synapse(segment, 77, 0.9).unwrap();
        let bytes = save_bytes(&other, SerializableFormat::Binary);

        target.load(Cursor::new(bytes), SerializableFormat::Binary).unwrap();

        // Same slot, flat index and generation as the loaded entities.
        assert!(!target.is_valid_segment(old_segment));
        assert!(!target.is_valid_synapse(old_synapse));
        assert!(matches!(
            target.cell_for_segment(old_segment),
            Err(DendriteError::InvalidSegment(s)) if s == old_segment
        ));
        assert!(matches!(
            target.destroy_synapse(old_synapse),
            Err(DendriteError::InvalidSynapse(s)) if s == old_synapse
        ));
        assert!(target.create_synapse(old_segment, 1, 0.5).is_err());
        assert_eq!(target.num_synapses(), 1);

        let fresh = target.segments_for_cell(5).unwrap()[0];
        assert!(target.is_valid_segment(fresh));
        assert_eq!(target.presynaptic_cells_for_segment(fresh).unwrap(), vec![77]);
        let fresh_synapse = target.synapses_for_segment(fresh).unwrap()[0];
        assert!(target.is_valid_synapse(fresh_synapse));

        // A second load moves the epoch again.
        let bytes = save_bytes(&target, SerializableFormat::Binary);
        target.load(Cursor::new(bytes), SerializableFormat::Binary).unwrap();
        assert!(!target.is_valid_segment(fresh));
        assert!(!target.is_valid_synapse(fresh_synapse));
    }

    #[test]
    fn test_failed_load_keeps_prior_handles() {
        let mut target = Connections::with_cells(16);
        let segment = target.create_segment(5).unwrap();

        assert!(target
            .load(Cursor::new(vec![0u8; 3]), SerializableFormat::Binary)
            .is_err());
        assert!(target.is_valid_segment(segment));
    }

    #[test]
    fn test_load_keeps_handlers_silently() {
        struct Counter(Arc<AtomicUsize>);
        impl ConnectionsEventHandler for Counter {
            fn on_create_segment(&mut self, _segment: Segment) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut target = Connections::default();
        target.subscribe(Box::new(Counter(Arc::clone(&calls))));

        let bytes = save_bytes(&sample(), SerializableFormat::Binary);
        target.load(Cursor::new(bytes), SerializableFormat::Binary).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(target.num_subscribers(), 1);

        target.create_segment(0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_serializable_trait_round_trip() {
        let original = sample();
        let bytes = original.to_bytes(SerializableFormat::Binary).unwrap();
        let restored = Connections::from_bytes(&bytes, SerializableFormat::Binary).unwrap();
        assert_eq!(original, restored);

        let json = original.to_json().unwrap();
        assert!(json.contains("presynaptic_cell"));
        assert_eq!(original, Connections::from_json(&json).unwrap());
    }

    #[test]
    fn test_empty_store_round_trip() {
        let original = Connections::default();
        let bytes = save_bytes(&original, SerializableFormat::Binary);

        let mut restored = Connections::with_cells(5);
        restored.load(Cursor::new(bytes), SerializableFormat::Binary).unwrap();
        assert_eq!(original, restored);
        assert_eq!(restored.num_cells(), 0);
    }
}
