//! Metal backend launch parameters.
//!
//! Metal binds the parameter block through an argument buffer and, unlike
//! the other backends, specializes kernels with named function constants
//! rather than preprocessor defines: one boolean constant per kernel
//! feature, generated here from the same feature table that drives the
//! feature mask. The compiler folds the constants and strips dead code at
//! pipeline-state creation.

use wavefront_core::{KernelFeatures, FEATURE_TABLE};
use wavefront_state::IntegratorStateGpu;

use crate::scene::{KernelData, SceneTables};

/// Argument-buffer index the parameter block is bound at.
pub const LAUNCH_PARAMS_BUFFER_INDEX: u32 = 0;

/// The parameter block laid out in the argument buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct LaunchParamsMetal {
    pub data: KernelData,
    pub integrator_state: IntegratorStateGpu,
    pub scene: SceneTables,
    /// Opaque id of the instance acceleration structure resource.
    pub accel_struct: u64,
}

impl LaunchParamsMetal {
    #[inline]
    pub fn kernel_data(&self) -> &KernelData {
        &self.data
    }

    #[inline]
    pub fn integrator_state(&self) -> &IntegratorStateGpu {
        &self.integrator_state
    }
}

/// One named function constant for pipeline specialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecializationConstant {
    /// Constant name as referenced by the kernel source.
    pub name: String,
    /// Function-constant index.
    pub index: u32,
    pub enabled: bool,
}

/// The function constants to compile a pipeline against `features` with,
/// one per entry of the feature table, in bit order.
pub fn specialization_constants(features: KernelFeatures) -> Vec<SpecializationConstant> {
    FEATURE_TABLE
        .iter()
        .enumerate()
        .map(|(index, desc)| SpecializationConstant {
            name: format!("kernel_feature_{}", desc.name),
            index: index as u32,
            enabled: features.contains(desc.flag),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_constant_per_feature() {
        let constants = specialization_constants(KernelFeatures::HAIR);
        assert_eq!(constants.len(), FEATURE_TABLE.len());

        let hair = constants
            .iter()
            .find(|c| c.name == "kernel_feature_hair")
            .unwrap();
        assert!(hair.enabled);
        let volume = constants
            .iter()
            .find(|c| c.name == "kernel_feature_node_volume")
            .unwrap();
        assert!(!volume.enabled);
    }

    #[test]
    fn indices_are_stable_and_dense() {
        let constants = specialization_constants(KernelFeatures::empty());
        for (i, constant) in constants.iter().enumerate() {
            assert_eq!(constant.index, i as u32);
        }
    }
}
