//! Core types for the connectivity store.
//!
//! This module contains the scalar aliases shared by every component and the
//! opaque handles the store hands out for segments and synapses.

mod handles;
mod primitives;

pub use handles::*;
pub use primitives::*;
