//! CPU backend globals.
//!
//! CPU kernels are ordinary functions; there is no launch, just a globals
//! struct passed down the call tree. Path state is the thread's own
//! array-of-structs record, reached by reference rather than slot index.

use wavefront_state::IntegratorStateCpu;

use crate::scene::{KernelData, SceneData};

/// Everything a CPU kernel can see: scene-constant data and the read-only
/// tables, shared by all worker threads without synchronization.
#[derive(Debug, Clone, Copy)]
pub struct KernelGlobalsCpu<'a> {
    pub data: &'a KernelData,
    pub scene: &'a SceneData,
}

impl<'a> KernelGlobalsCpu<'a> {
    pub fn new(data: &'a KernelData, scene: &'a SceneData) -> KernelGlobalsCpu<'a> {
        KernelGlobalsCpu { data, scene }
    }

    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        self.data
    }
}

/// One worker thread's slice of the render: its own path state record and
/// the shared globals.
pub struct CpuThreadContext<'a> {
    pub globals: KernelGlobalsCpu<'a>,
    pub state: &'a mut IntegratorStateCpu,
}
