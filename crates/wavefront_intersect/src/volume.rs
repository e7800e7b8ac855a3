//! Volume-stack any-hit predicate.
//!
//! When a ray rebuilds its nested-volume stack, traversal collects every
//! triangle whose object can bound a volume. This filter is the acceptance
//! test: much simpler than the shadow filter, it never terminates traversal,
//! it only keeps or drops candidates.

use wavefront_core::types::{Intersection, ObjectFlags, RaySelf, ShaderFlags, VisibilityFlags};
use wavefront_device::KernelGlobalsCpu;

use crate::shadow_all::intersection_skip_self_shadow;

/// Whether a candidate triangle hit belongs in the volume-stack pass.
///
/// Rejects hits that are invisible to the ray, on objects without volume
/// shaders, self-intersections, or on shaders with no volume closure.
pub fn volume_anyhit_triangle_filter(
    globals: &KernelGlobalsCpu,
    self_prims: &RaySelf,
    visibility: VisibilityFlags,
    candidate: &Intersection,
) -> bool {
    if !globals
        .scene
        .object_visibility(candidate.object)
        .intersects(visibility)
    {
        return false;
    }
    if !globals
        .scene
        .object_flags(candidate.object)
        .contains(ObjectFlags::HAS_VOLUME)
    {
        return false;
    }
    if intersection_skip_self_shadow(self_prims, candidate.object, candidate.prim) {
        return false;
    }
    if !globals
        .scene
        .intersection_shader_flags(candidate)
        .contains(ShaderFlags::HAS_VOLUME)
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavefront_core::types::PrimitiveKind;
    use wavefront_device::{KernelData, SceneData};

    fn scene() -> SceneData {
        SceneData {
            // Shader 0 has a volume closure, shader 1 does not.
            shader_flags: vec![ShaderFlags::HAS_VOLUME.bits(), 0],
            // Object 0 bounds a volume, object 1 does not.
            object_flags: vec![ObjectFlags::HAS_VOLUME.bits(), 0],
            object_visibility: vec![VisibilityFlags::ALL.bits(); 2],
            prim_shader: vec![0, 1],
            curve_shadow_transparency: vec![0.0; 2],
        }
    }

    fn triangle(object: i32, prim: i32) -> Intersection {
        Intersection {
            t: 1.0,
            u: 0.0,
            v: 0.0,
            prim,
            object,
            kind: PrimitiveKind::TRIANGLE.bits(),
        }
    }

    #[test]
    fn accepts_volume_triangles_only() {
        let data = KernelData {
            kernel_features: 0,
            max_shaders: 2,
            volume_stack_size: 4,
            max_transparent_hits: 8,
        };
        let scene = scene();
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let no_self = RaySelf::NONE;

        assert!(volume_anyhit_triangle_filter(
            &globals,
            &no_self,
            VisibilityFlags::SHADOW,
            &triangle(0, 0)
        ));
        // Object without a volume.
        assert!(!volume_anyhit_triangle_filter(
            &globals,
            &no_self,
            VisibilityFlags::SHADOW,
            &triangle(1, 0)
        ));
        // Shader without a volume closure.
        assert!(!volume_anyhit_triangle_filter(
            &globals,
            &no_self,
            VisibilityFlags::SHADOW,
            &triangle(0, 1)
        ));
        // Self intersection.
        let self_prims = RaySelf { object: 0, prim: 0, ..RaySelf::NONE };
        assert!(!volume_anyhit_triangle_filter(
            &globals,
            &self_prims,
            VisibilityFlags::SHADOW,
            &triangle(0, 0)
        ));
    }
}
