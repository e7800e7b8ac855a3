//! Layout-independent views over state.
//!
//! The traversal-time filters are written once against these traits and run
//! unchanged over either physical layout: the CPU's embedded shadow state or
//! one GPU path slot of the SoA arena.

use wavefront_core::types::Intersection;

/// The bounded per-ray transparent-hit record array of a shadow path.
///
/// The capacity is a device property (1024 on CPU targets, 4 on GPU); the
/// recording policy that fills it lives in `wavefront_intersect` and keeps
/// the N closest hits seen so far.
pub trait ShadowIsectArray {
    /// Number of record slots physically present.
    fn capacity(&self) -> u32;

    /// Reads a stored hit. `index` must be below [`Self::capacity`].
    fn get(&self, index: u32) -> Intersection;

    /// Overwrites a record slot. `index` must be below [`Self::capacity`].
    fn set(&mut self, index: u32, isect: &Intersection);
}
