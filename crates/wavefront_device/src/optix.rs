//! OptiX backend launch parameters.
//!
//! OptiX passes parameters through the pipeline launch-params buffer rather
//! than a constant symbol, and traversal goes through an opaque handle to
//! the built acceleration structure instead of an explicit BVH walk.

use wavefront_state::IntegratorStateGpu;

use crate::scene::{KernelData, SceneTables};

/// Name of the pipeline launch-parameters variable the modules are compiled
/// against.
pub const LAUNCH_PARAMS_VARIABLE: &str = "__params";

/// An opaque handle to a traversable acceleration structure.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, cust_core::DeviceCopy)]
pub struct TraversableHandle(pub u64);

impl TraversableHandle {
    /// The null handle; tracing against it reaches only the miss program.
    pub const NULL: TraversableHandle = TraversableHandle(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// The launch-parameter block, uploaded once per dispatch batch.
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct LaunchParamsOptix {
    pub data: KernelData,
    pub integrator_state: IntegratorStateGpu,
    pub scene: SceneTables,
    /// Top-level acceleration structure to trace against.
    pub tlas: TraversableHandle,
}

impl LaunchParamsOptix {
    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        &self.data
    }

    #[inline]
    pub fn integrator_state(&self) -> &IntegratorStateGpu {
        &self.integrator_state
    }
}
