//! # Wavefront integrator state containers
//!
//! The two physical layouts of in-flight path state, generated from one
//! field inventory:
//!
//! - [`aos`]: the CPU form, one contiguous record per path with the shadow
//!   and ambient-occlusion sub-states embedded. A worker thread owns one
//!   record and is addressed by reference.
//! - [`soa`]: the GPU form, one array per field over all path slots, with a
//!   `#[repr(C)]` pointer block handed to kernel launches. A path is an
//!   integer slot index with `-1` as the null sentinel.
//!
//! Plus the bookkeeping shared across paths: per-stage queue counters, the
//! per-shader sort-key counters used for dispatch coherence, and the atomic
//! slot allocators — the only synchronization primitive in the model. Slots
//! are exclusively owned by their allocating path; the two sanctioned
//! cross-slot operations (shadow-catcher split, compaction move) are bulk
//! copies into freshly claimed or known-dead slots, never concurrent
//! mutation of a shared one.

pub mod alloc;
pub mod aos;
pub mod error;
pub mod handle;
pub mod kernel;
mod layout;
pub mod ops;
pub mod soa;

pub use alloc::{IntegratorQueueCounter, QueueCounters, ShaderSortCounters, SlotAllocator};
pub use aos::{IntegratorShadowStateCpu, IntegratorStateCpu};
pub use error::{StateError, StateResult};
pub use handle::{PathIndex, ShadowPathIndex};
pub use kernel::{DeviceKernel, DEVICE_KERNEL_COUNT};
pub use ops::ShadowIsectArray;
pub use soa::{IntegratorStateGpu, SoaArena, SoaSizes};
