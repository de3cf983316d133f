//! Primitive type definitions for the connectivity store.
//!
//! Plain aliases for the scalar quantities that flow through the store. Handles
//! to segments and synapses live in [`super::handles`].

/// Index type for cells, both owning and presynaptic.
pub type CellIdx = u32;

/// Position of a segment within its cell's segment list.
pub type SegmentIdx = u16;

/// Count of synapses, as produced by activity computation.
pub type SynapseIdx = u32;

/// Synapse permanence value (0.0 to 1.0).
pub type Permanence = f32;

/// Minimum permanence value.
pub const MIN_PERMANENCE: Permanence = 0.0;

/// Maximum permanence value.
pub const MAX_PERMANENCE: Permanence = 1.0;

/// Epsilon for floating point comparisons.
pub const EPSILON: Permanence = 1e-6;

/// Clamps a permanence into `[MIN_PERMANENCE, MAX_PERMANENCE]`.
///
/// `NaN` maps to [`MIN_PERMANENCE`], so every stored permanence is finite.
#[inline]
#[must_use]
pub fn clamp_permanence(permanence: Permanence) -> Permanence {
    if permanence.is_nan() {
        return MIN_PERMANENCE;
    }
    permanence.clamp(MIN_PERMANENCE, MAX_PERMANENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sizes() {
        assert_eq!(core::mem::size_of::<CellIdx>(), 4);
        assert_eq!(core::mem::size_of::<SegmentIdx>(), 2);
        assert_eq!(core::mem::size_of::<SynapseIdx>(), 4);
        assert_eq!(core::mem::size_of::<Permanence>(), 4);
    }

    #[test]
    fn test_permanence_bounds() {
        assert!(MIN_PERMANENCE < MAX_PERMANENCE);
        assert!(EPSILON > 0.0);
        assert!(EPSILON < 0.001);
    }

    #[test]
    fn test_clamp_permanence() {
        assert_eq!(clamp_permanence(-0.02), 0.0);
        assert_eq!(clamp_permanence(1.02), 1.0);
        assert_eq!(clamp_permanence(f32::NAN), 0.0);
        assert_eq!(clamp_permanence(f32::INFINITY), 1.0);
        assert!((clamp_permanence(0.34) - 0.34).abs() < EPSILON);
    }
}
