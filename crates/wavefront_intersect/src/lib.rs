//! # Wavefront integrator traversal filters
//!
//! The any-hit callbacks the BVH backends invoke during traversal, written
//! once over the layout-independent state views so the same logic serves the
//! CPU record arrays and the GPU SoA slots:
//!
//! - [`shadow_all`]: the transparent-shadow filter. Accumulates hair
//!   transparency, records up to N closest transparent hits into the shadow
//!   path, and decides when traversal may stop because the ray is provably
//!   blocked.
//! - [`volume`]: the volume-stack acceptance predicate for triangles
//!   bounding volumes.

pub mod shadow_all;
pub mod volume;

pub use shadow_all::{
    intersection_skip_self_shadow, shadow_all_filter, FilterResult, ShadowAllPayload,
};
pub use volume::volume_anyhit_triangle_filter;
