//! CUDA backend launch parameters.
//!
//! CUDA kernels read their parameters from one `__constant__` symbol that
//! the host writes before each dispatch batch. This module defines the exact
//! layout of that symbol; the host-side driver wrapper copies a
//! [`KernelParamsCuda`] to [`KERNEL_PARAMS_SYMBOL`] and the device sees the
//! same bytes.

use wavefront_state::IntegratorStateGpu;

use crate::scene::{KernelData, SceneTables};

/// Name of the `__constant__` parameter symbol in the compiled module.
pub const KERNEL_PARAMS_SYMBOL: &str = "kernel_params";

/// The parameter block bound to [`KERNEL_PARAMS_SYMBOL`].
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct KernelParamsCuda {
    pub data: KernelData,
    pub integrator_state: IntegratorStateGpu,
    pub scene: SceneTables,
}

impl KernelParamsCuda {
    pub fn new(
        data: KernelData,
        integrator_state: IntegratorStateGpu,
        scene: SceneTables,
    ) -> KernelParamsCuda {
        KernelParamsCuda { data, integrator_state, scene }
    }

    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        &self.data
    }

    #[inline]
    pub fn integrator_state(&self) -> &IntegratorStateGpu {
        &self.integrator_state
    }
}
