//! # Wavefront integrator device backends
//!
//! One module per backend, each defining the exact launch parameter block
//! its kernels read and the binding mechanism that gets it there: a constant
//! symbol for CUDA and HIP, the pipeline launch-params buffer for OptiX, an
//! argument buffer plus function constants for Metal, an explicit pointer
//! argument for oneAPI, and the custom intersection-function table HIP-RT
//! needs on top. None of these modules contain logic; they are layout and
//! symbol names, so kernel code stays backend-agnostic and reaches
//! everything through the uniform `kernel_data()` / `integrator_state()`
//! accessors.
//!
//! The blocks embed the structure-of-arrays pointer view from
//! `wavefront_state` and the read-only scene tables from [`scene`]
//! unchanged; backends differ only in how the bytes arrive.

pub mod cpu;
pub mod cuda;
pub mod hip;
pub mod hiprt;
pub mod metal;
pub mod oneapi;
pub mod optix;
pub mod scene;

pub use cpu::KernelGlobalsCpu;
pub use hiprt::{IntersectFunctionTable, RayPurpose};
pub use scene::{KernelData, SceneData, SceneTables};
