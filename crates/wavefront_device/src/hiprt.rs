//! HIP-RT backend launch parameters.
//!
//! HIP-RT's hardware traversal only intersects triangles natively. Curves,
//! motion triangles, and points go through custom intersection and filter
//! functions, selected at traversal time from a table keyed by primitive
//! kind and ray purpose. The table is built once at pipeline compile time
//! from the function indices the HIP-RT runtime assigned, and shipped to the
//! device inside the parameter block.

use wavefront_core::types::PrimitiveKind;
use wavefront_state::IntegratorStateGpu;

use crate::scene::{KernelData, SceneTables};

/// Name of the constant parameter symbol in the compiled HIP-RT module.
pub const KERNEL_PARAMS_SYMBOL: &str = "kernel_params";

/// What a traversal is for; selects which custom function column applies.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayPurpose {
    /// Closest-hit traversal for camera and bounce rays.
    Closest = 0,
    /// Any-hit traversal for shadow rays.
    Shadow = 1,
    /// Local traversal restricted to one object (subsurface probes).
    Local = 2,
    /// Volume-stack traversal collecting volume boundaries.
    Volume = 3,
}

pub const RAY_PURPOSE_COUNT: usize = 4;

impl RayPurpose {
    pub const ALL: [RayPurpose; RAY_PURPOSE_COUNT] = [
        RayPurpose::Closest,
        RayPurpose::Shadow,
        RayPurpose::Local,
        RayPurpose::Volume,
    ];
}

/// Index of an unset table entry.
const FUNCTION_NONE: i32 = -1;

/// Primitive kinds that need custom functions, one table row each.
const CUSTOM_PRIM_ROWS: usize = 4;

/// Custom intersection/filter function indices, keyed by
/// (primitive kind, ray purpose). Triangles stay on the hardware path and
/// have no row.
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct IntersectFunctionTable {
    entries: [[i32; RAY_PURPOSE_COUNT]; CUSTOM_PRIM_ROWS],
}

impl IntersectFunctionTable {
    pub fn new() -> IntersectFunctionTable {
        IntersectFunctionTable {
            entries: [[FUNCTION_NONE; RAY_PURPOSE_COUNT]; CUSTOM_PRIM_ROWS],
        }
    }

    fn row(kind: PrimitiveKind) -> Option<usize> {
        if kind == PrimitiveKind::MOTION_TRIANGLE {
            Some(0)
        } else if kind == PrimitiveKind::CURVE_THICK {
            Some(1)
        } else if kind == PrimitiveKind::CURVE_RIBBON {
            Some(2)
        } else if kind == PrimitiveKind::POINT {
            Some(3)
        } else {
            None
        }
    }

    /// Registers the function index the HIP-RT runtime assigned for this
    /// (kind, purpose) pair. Panics for kinds on the hardware path.
    pub fn set(&mut self, kind: PrimitiveKind, purpose: RayPurpose, function_index: i32) {
        let row = Self::row(kind).expect("primitive kind uses hardware traversal");
        self.entries[row][purpose as usize] = function_index;
    }

    /// The function index for a (kind, purpose) pair; `None` for the
    /// hardware path or an unregistered entry.
    pub fn get(&self, kind: PrimitiveKind, purpose: RayPurpose) -> Option<i32> {
        let row = Self::row(kind)?;
        let index = self.entries[row][purpose as usize];
        (index != FUNCTION_NONE).then_some(index)
    }
}

impl Default for IntersectFunctionTable {
    fn default() -> Self {
        IntersectFunctionTable::new()
    }
}

/// The parameter block bound to [`KERNEL_PARAMS_SYMBOL`].
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct KernelParamsHiprt {
    pub data: KernelData,
    pub integrator_state: IntegratorStateGpu,
    pub scene: SceneTables,
    /// Opaque handle of the built HIP-RT scene.
    pub rt_scene: u64,
    pub intersect_functions: IntersectFunctionTable,
}

impl KernelParamsHiprt {
    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        &self.data
    }

    #[inline]
    pub fn integrator_state(&self) -> &IntegratorStateGpu {
        &self.integrator_state
    }
}
