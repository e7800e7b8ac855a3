//! oneAPI backend launch parameters.
//!
//! SYCL kernels take their parameters as an explicit pointer argument per
//! dispatch rather than a module-level symbol, so the block here is built
//! once and its address passed to every kernel invocation.

use wavefront_state::IntegratorStateGpu;

use crate::scene::{KernelData, SceneTables};

/// The parameter block passed by address to every kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct KernelParamsOneapi {
    pub data: KernelData,
    pub integrator_state: IntegratorStateGpu,
    pub scene: SceneTables,
}

impl KernelParamsOneapi {
    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        &self.data
    }

    #[inline]
    pub fn integrator_state(&self) -> &IntegratorStateGpu {
        &self.integrator_state
    }
}
