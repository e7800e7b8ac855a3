//! HIP backend launch parameters.
//!
//! Identical in shape to the CUDA block; only the binding mechanism (the HIP
//! module symbol) differs.

use wavefront_state::IntegratorStateGpu;

use crate::scene::{KernelData, SceneTables};

/// Name of the constant parameter symbol in the compiled HIP module.
pub const KERNEL_PARAMS_SYMBOL: &str = "kernel_params";

/// The parameter block bound to [`KERNEL_PARAMS_SYMBOL`].
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct KernelParamsHip {
    pub data: KernelData,
    pub integrator_state: IntegratorStateGpu,
    pub scene: SceneTables,
}

impl KernelParamsHip {
    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        &self.data
    }

    #[inline]
    pub fn integrator_state(&self) -> &IntegratorStateGpu {
        &self.integrator_state
    }
}
