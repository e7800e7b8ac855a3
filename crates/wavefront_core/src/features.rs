//! The kernel feature mask.
//!
//! A scene is compiled down to a set of optional renderer capabilities, and
//! every kernel build is specialized against that set: state fields owned by a
//! disabled feature are never allocated, and code paths guarded by a disabled
//! feature must never run. The host-side scene compiler computes the mask once
//! and passes it in; nothing in this workspace ever turns a flag back on.
//!
//! Querying a flag that is not part of the mask is not an error, it simply
//! evaluates to false. This is relied upon by coarse-grained shader
//! specialization: a shader-evaluation kernel is compiled against one of the
//! precomputed node-mask unions and asks for individual flags inside it.

use bitflags::bitflags;

bitflags! {
    /// Optional renderer capabilities active for a scene, as computed by the
    /// host-side scene compiler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KernelFeatures: u32 {
        /// Shader nodes that evaluate a BSDF.
        const NODE_BSDF = 1 << 0;
        /// Emission shader nodes.
        const NODE_EMISSION = 1 << 1;
        /// Volume shader nodes.
        const NODE_VOLUME = 1 << 2;
        /// Bump mapping nodes.
        const NODE_BUMP = 1 << 3;
        /// Bump evaluation needs dual shader-data state.
        const NODE_BUMP_STATE = 1 << 4;
        /// Voronoi texture nodes with the extended output set.
        const NODE_VORONOI_EXTRA = 1 << 5;
        /// Shader raytrace nodes (ambient occlusion / bevel).
        const NODE_RAYTRACE = 1 << 6;
        /// Arbitrary-output-value nodes.
        const NODE_AOV = 1 << 7;
        /// Light-path query nodes.
        const NODE_LIGHT_PATH = 1 << 8;
        /// Principled hair BSDF nodes.
        const NODE_PRINCIPLED_HAIR = 1 << 9;
        /// Curve primitives are present in the scene.
        const HAIR = 1 << 10;
        /// Curves with a full 3D cross-section rather than ribbons.
        const HAIR_THICK = 1 << 11;
        /// Point-cloud primitives.
        const POINTCLOUD = 1 << 12;
        /// Per-object motion blur.
        const OBJECT_MOTION = 1 << 13;
        /// Camera motion blur.
        const CAMERA_MOTION = 1 << 14;
        /// The path-tracing integrator itself; off for bake-only kernels.
        const PATH_TRACING = 1 << 15;
        /// Baking kernels.
        const BAKING = 1 << 16;
        /// Subsurface scattering.
        const SUBSURFACE = 1 << 17;
        /// Subdivision-surface patch evaluation.
        const PATCH_EVALUATION = 1 << 18;
        /// Transparent shadows; without it any shadow hit is opaque.
        const TRANSPARENT = 1 << 19;
        /// Shadow-catcher objects, which split paths on first catcher hit.
        const SHADOW_CATCHER = 1 << 20;
        /// Separate diffuse/glossy/transmission light passes.
        const LIGHT_PASSES = 1 << 21;
        /// Denoising feature passes (albedo, normal).
        const DENOISING = 1 << 22;
        /// Ambient-occlusion render pass.
        const AO_PASS = 1 << 23;
        /// Additive ambient occlusion blended into the combined pass.
        const AO_ADDITIVE = 1 << 24;
        /// Manifold next-event estimation for caustics.
        const MNEE = 1 << 25;
        /// Path guiding.
        const PATH_GUIDING = 1 << 26;
        /// Open Shading Language shader evaluation.
        const OSL_SHADING = 1 << 27;
        /// Restricting lights to subsets of receiving objects.
        const LIGHT_LINKING = 1 << 28;
        /// Restricting shadow casting to subsets of blocking objects.
        const SHADOW_LINKING = 1 << 29;
    }
}

impl KernelFeatures {
    /// Shader nodes needed on surfaces hit by light sampling.
    pub const NODE_MASK_SURFACE_LIGHT: KernelFeatures = KernelFeatures::NODE_EMISSION
        .union(KernelFeatures::NODE_VORONOI_EXTRA)
        .union(KernelFeatures::NODE_LIGHT_PATH);

    /// Shader nodes needed on surfaces hit by shadow rays.
    pub const NODE_MASK_SURFACE_SHADOW: KernelFeatures = KernelFeatures::NODE_BSDF
        .union(KernelFeatures::NODE_EMISSION)
        .union(KernelFeatures::NODE_VOLUME)
        .union(KernelFeatures::NODE_BUMP)
        .union(KernelFeatures::NODE_BUMP_STATE)
        .union(KernelFeatures::NODE_VORONOI_EXTRA)
        .union(KernelFeatures::NODE_LIGHT_PATH);

    /// The full surface shader node set.
    pub const NODE_MASK_SURFACE: KernelFeatures = KernelFeatures::NODE_MASK_SURFACE_SHADOW
        .union(KernelFeatures::NODE_RAYTRACE)
        .union(KernelFeatures::NODE_AOV)
        .union(KernelFeatures::NODE_PRINCIPLED_HAIR);

    /// Shader nodes evaluated inside volume segments.
    pub const NODE_MASK_VOLUME: KernelFeatures = KernelFeatures::NODE_EMISSION
        .union(KernelFeatures::NODE_VOLUME)
        .union(KernelFeatures::NODE_VORONOI_EXTRA)
        .union(KernelFeatures::NODE_LIGHT_PATH);

    /// Any form of ambient occlusion.
    pub const AO: KernelFeatures =
        KernelFeatures::AO_PASS.union(KernelFeatures::AO_ADDITIVE);

    /// Whether `feature` is active. An unknown or cleared bit is simply
    /// inactive, never an error.
    #[inline]
    pub fn has(self, feature: KernelFeatures) -> bool {
        self.contains(feature)
    }
}

/// One row of the feature table: a flag and its stable lowercase name.
///
/// The table exists so the mask can be consumed a second time as a list
/// rather than a bit set, which is what the Metal backend needs to emit one
/// named function constant per feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureDesc {
    pub name: &'static str,
    pub flag: KernelFeatures,
}

macro_rules! feature_table {
    ($($flag:ident => $name:literal),* $(,)?) => {
        /// Every feature flag with its stable name, in bit order.
        pub const FEATURE_TABLE: &[FeatureDesc] = &[
            $(FeatureDesc { name: $name, flag: KernelFeatures::$flag }),*
        ];
    };
}

feature_table! {
    NODE_BSDF => "node_bsdf",
    NODE_EMISSION => "node_emission",
    NODE_VOLUME => "node_volume",
    NODE_BUMP => "node_bump",
    NODE_BUMP_STATE => "node_bump_state",
    NODE_VORONOI_EXTRA => "node_voronoi_extra",
    NODE_RAYTRACE => "node_raytrace",
    NODE_AOV => "node_aov",
    NODE_LIGHT_PATH => "node_light_path",
    NODE_PRINCIPLED_HAIR => "node_principled_hair",
    HAIR => "hair",
    HAIR_THICK => "hair_thick",
    POINTCLOUD => "pointcloud",
    OBJECT_MOTION => "object_motion",
    CAMERA_MOTION => "camera_motion",
    PATH_TRACING => "path_tracing",
    BAKING => "baking",
    SUBSURFACE => "subsurface",
    PATCH_EVALUATION => "patch_evaluation",
    TRANSPARENT => "transparent",
    SHADOW_CATCHER => "shadow_catcher",
    LIGHT_PASSES => "light_passes",
    DENOISING => "denoising",
    AO_PASS => "ao_pass",
    AO_ADDITIVE => "ao_additive",
    MNEE => "mnee",
    PATH_GUIDING => "path_guiding",
    OSL_SHADING => "osl_shading",
    LIGHT_LINKING => "light_linking",
    SHADOW_LINKING => "shadow_linking",
}
