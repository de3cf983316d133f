//! # Dendrite - synaptic connectivity for Hierarchical Temporal Memory
//!
//! Dendrite is the connectivity store underneath HTM-style sequence learning.
//! For a fixed population of cells it keeps a growing and shrinking graph of
//! dendrite segments (owned by cells) and synapses (owned by segments, each
//! pointing at a presynaptic cell).
//!
//! ## Overview
//!
//! - **Topology**: create and destroy segments and synapses through stable
//!   handles that survive unrelated destroys and slot reuse
//! - **Activity**: count, per segment, the synapses that target an active set
//!   of cells, split by a permanence threshold
//! - **Learning**: Hebbian permanence updates on a segment's synapses
//! - **Events**: synchronous notification of every mutation to owned handlers
//! - **Persistence**: save and load full state with structural equality
//!
//! ## Quick Start
//!
//! ```rust
//! use dendrite::prelude::*;
//!
//! let mut connections = Connections::with_cells(1024);
//!
//! let segment = connections.create_segment(10)?;
//! connections.create_synapse(segment, 150, 0.85)?;
//! connections.create_synapse(segment, 151, 0.15)?;
//!
//! let (connected, potential) = connections.compute_activity([150, 151], 0.5);
//! assert_eq!(connected[segment.flat_idx()], 1);
//! assert_eq!(potential[segment.flat_idx()], 2);
//!
//! connections.adapt_segment(segment, [150], 0.1, 0.01)?;
//! # Ok::<(), dendrite::DendriteError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable save/load and serde support for handles

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]

pub mod connections;
pub mod types;

#[cfg(feature = "serde")]
pub mod serialization;

/// Re-export of commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::connections::{
        Connections, ConnectionsEventHandler, ConnectionsParams, SubscriptionToken, SynapseData,
    };
    pub use crate::types::{
        CellIdx, Permanence, Segment, SegmentIdx, Synapse, SynapseIdx, MAX_PERMANENCE,
        MIN_PERMANENCE,
    };

    #[cfg(feature = "serde")]
    pub use crate::serialization::{Serializable, SerializableFormat};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library.
pub mod error {
    use crate::connections::SubscriptionToken;
    use crate::types::{Segment, Synapse};
    use thiserror::Error;

    /// Main error type for dendrite operations.
    #[derive(Error, Debug)]
    pub enum DendriteError {
        /// Invalid parameter value.
        #[error("Invalid parameter '{name}': {message}")]
        InvalidParameter {
            /// Name of the invalid parameter.
            name: &'static str,
            /// Description of the error.
            message: String,
        },

        /// Index out of bounds.
        #[error("Index {index} out of bounds (size: {size})")]
        IndexOutOfBounds {
            /// The invalid index.
            index: usize,
            /// The valid size.
            size: usize,
        },

        /// The segment handle was destroyed or never issued by this store.
        #[error("Invalid segment handle: {0}")]
        InvalidSegment(Segment),

        /// The synapse handle was destroyed or never issued by this store.
        #[error("Invalid synapse handle: {0}")]
        InvalidSynapse(Synapse),

        /// The store ran out of 32-bit slot numbers or flat indices.
        #[error("Capacity exceeded: no more {0} available")]
        CapacityExceeded(&'static str),

        /// No handler is subscribed under this token.
        #[error("Unknown subscription token: {0}")]
        UnknownSubscription(SubscriptionToken),

        /// Serialized state has an unsupported format version.
        #[error("Version mismatch: found {found}, expected {expected}")]
        VersionMismatch {
            /// Version stored in the input.
            found: u32,
            /// Version this build reads.
            expected: u32,
        },

        /// Serialized state decoded but does not describe a valid store.
        #[error("Corrupt state: {0}")]
        CorruptState(String),

        /// Serialization error.
        #[cfg(feature = "serde")]
        #[error("Serialization error: {message}")]
        SerializationError {
            /// Description of the serialization error.
            message: String,
        },

        /// I/O error.
        #[error("I/O error: {message}")]
        IoError {
            /// Description of the I/O error.
            message: String,
        },
    }

    /// Result type alias using `DendriteError`.
    pub type Result<T> = std::result::Result<T, DendriteError>;
}

pub use error::{DendriteError, Result};
