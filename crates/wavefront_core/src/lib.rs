//! # Wavefront integrator core
//!
//! Shared foundation of the wavefront path-tracing integrator state model:
//! the kernel feature mask, the data types that cross the host/device
//! boundary, and the declarative schema describing every field of in-flight
//! path state.
//!
//! A "path" here is not a thread. It is a resumable computation whose entire
//! continuation is its state record; between kernel dispatches nothing about
//! a path lives anywhere else. The crates layered on top generate the two
//! physical layouts of that record (array-of-structs for CPU threads,
//! structure-of-arrays for GPU path slots), wrap them into per-backend launch
//! parameter blocks, and run the traversal-time filters that consume them.

pub mod features;
pub mod schema;
pub mod types;

pub use features::{FeatureDesc, KernelFeatures, FEATURE_TABLE};
pub use types::*;

/// Marker trait for data that can be copied to a device untranslated.
pub use cust_core::DeviceCopy;
