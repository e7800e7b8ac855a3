//! Read-only scene data as kernels see it.
//!
//! The scene itself (geometry, shader graphs, textures) is compiled elsewhere;
//! kernels only ever read a handful of flat tables from it: per-shader and
//! per-object capability words, per-object visibility, the primitive-to-shader
//! mapping, and the baked curve shadow transparency used by the hair shortcut
//! in the shadow filter. All of it is shared by every path with no
//! synchronization, it is immutable for the duration of a render.

use wavefront_core::types::{
    Intersection, ObjectFlags, ShaderFlags, VisibilityFlags,
};
use wavefront_core::KernelFeatures;

/// Scene-constant words every kernel reads, the `kernel_data` block.
#[repr(C)]
#[derive(Debug, Clone, Copy, cust_core::DeviceCopy)]
pub struct KernelData {
    /// Raw [`KernelFeatures`] bits the kernels were specialized against.
    pub kernel_features: u32,
    pub max_shaders: u32,
    /// Entries usable in the per-path volume stack, terminator included.
    pub volume_stack_size: u32,
    /// Transparent surfaces a shadow ray may pass through before it is
    /// treated as fully blocked.
    pub max_transparent_hits: u32,
}

impl KernelData {
    #[inline]
    pub fn features(&self) -> KernelFeatures {
        KernelFeatures::from_bits_truncate(self.kernel_features)
    }
}

/// Raw scene table handles as embedded in launch parameter blocks. Host
/// addresses on the CPU backend, device addresses everywhere else; the shape
/// never changes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SceneTables {
    /// Per-shader [`ShaderFlags`] words, indexed by shader id.
    pub shader_flags: *const u32,
    /// Per-object [`ObjectFlags`] words, indexed by object id.
    pub object_flags: *const u32,
    /// Per-object [`VisibilityFlags`] words, indexed by object id.
    pub object_visibility: *const u32,
    /// Shader id of each primitive.
    pub prim_shader: *const u32,
    /// Baked shadow transparency of each curve primitive; 0 for others.
    pub curve_shadow_transparency: *const f32,
    pub num_shaders: u32,
    pub num_objects: u32,
    pub num_prims: u32,
}

// SAFETY: `SceneTables` is a flat block of raw device/host addresses and plain
// integers; the derive cannot see through the raw pointers, so the impl is
// written by hand, matching the pattern used for the SoA pointer blocks.
unsafe impl cust_core::DeviceCopy for SceneTables {}

/// Host-side owner of the scene tables.
#[derive(Debug, Default)]
pub struct SceneData {
    pub shader_flags: Vec<u32>,
    pub object_flags: Vec<u32>,
    pub object_visibility: Vec<u32>,
    pub prim_shader: Vec<u32>,
    pub curve_shadow_transparency: Vec<f32>,
}

impl SceneData {
    /// Shader capability word, by shader id.
    #[inline]
    pub fn shader_flags(&self, shader: u32) -> ShaderFlags {
        ShaderFlags::from_bits_truncate(self.shader_flags[shader as usize])
    }

    /// Object capability word, by object id.
    #[inline]
    pub fn object_flags(&self, object: i32) -> ObjectFlags {
        ObjectFlags::from_bits_truncate(self.object_flags[object as usize])
    }

    /// Object visibility word, by object id.
    #[inline]
    pub fn object_visibility(&self, object: i32) -> VisibilityFlags {
        VisibilityFlags::from_bits_truncate(self.object_visibility[object as usize])
    }

    /// Shader id of the primitive a candidate hit landed on.
    #[inline]
    pub fn intersection_shader(&self, isect: &Intersection) -> u32 {
        self.prim_shader[isect.prim as usize]
    }

    /// Capability word of the shader a candidate hit landed on.
    #[inline]
    pub fn intersection_shader_flags(&self, isect: &Intersection) -> ShaderFlags {
        self.shader_flags(self.intersection_shader(isect))
    }

    /// Baked shadow transparency of a curve hit. The bake already folds in
    /// the curve cross-section, so the hit parameter is not needed.
    #[inline]
    pub fn curve_shadow_transparency(&self, isect: &Intersection) -> f32 {
        self.curve_shadow_transparency[isect.prim as usize]
    }

    /// The raw table handles for embedding into a launch parameter block.
    pub fn tables(&self) -> SceneTables {
        SceneTables {
            shader_flags: self.shader_flags.as_ptr(),
            object_flags: self.object_flags.as_ptr(),
            object_visibility: self.object_visibility.as_ptr(),
            prim_shader: self.prim_shader.as_ptr(),
            curve_shadow_transparency: self.curve_shadow_transparency.as_ptr(),
            num_shaders: self.shader_flags.len() as u32,
            num_objects: self.object_flags.len() as u32,
            num_prims: self.prim_shader.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookups() {
        let scene = SceneData {
            shader_flags: vec![0, ShaderFlags::HAS_TRANSPARENT_SHADOW.bits()],
            object_flags: vec![ObjectFlags::HAS_VOLUME.bits()],
            object_visibility: vec![VisibilityFlags::ALL.bits()],
            prim_shader: vec![1, 0],
            curve_shadow_transparency: vec![0.0, 0.5],
        };

        let isect = Intersection { prim: 0, ..Intersection::NONE };
        assert!(scene
            .intersection_shader_flags(&isect)
            .contains(ShaderFlags::HAS_TRANSPARENT_SHADOW));
        assert!(scene.object_flags(0).contains(ObjectFlags::HAS_VOLUME));

        let tables = scene.tables();
        assert_eq!(tables.num_shaders, 2);
        assert_eq!(tables.num_prims, 2);
    }
}
