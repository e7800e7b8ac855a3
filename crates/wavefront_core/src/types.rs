//! Kernel data types shared by every backend.
//!
//! Everything here crosses the host/device boundary, so it is all `#[repr(C)]`
//! and [`DeviceCopy`]. Vectors are stored as [`PackedVec3`] (three tightly
//! packed floats) and converted to [`glam::Vec3`] at the point of use; the
//! structure-of-arrays layout cannot afford the padding of an aligned vector
//! type.

use bytemuck::{Pod, Zeroable};
use cust_core::DeviceCopy;
use glam::Vec3;

use bitflags::bitflags;

/// Sentinel object id meaning "no object".
pub const OBJECT_NONE: i32 = -1;
/// Sentinel primitive id meaning "no primitive".
pub const PRIM_NONE: i32 = -1;
/// Sentinel shader id; also the volume-stack terminator.
pub const SHADER_NONE: i32 = -1;
/// Sentinel lamp id.
pub const LAMP_NONE: i32 = -1;

/// Transparent shadow hits recordable per ray on the CPU.
pub const INTEGRATOR_SHADOW_ISECT_SIZE_CPU: usize = 1024;
/// Transparent shadow hits recordable per ray on GPU backends, where the
/// structure-of-arrays footprint of the array is paid for every path slot.
pub const INTEGRATOR_SHADOW_ISECT_SIZE_GPU: usize = 4;

/// Fixed capacity of the per-path nested-volume stack, including the
/// terminating sentinel entry.
pub const MAX_VOLUME_STACK_SIZE: usize = 32;

/// Running curve shadow transparency below this is treated as fully opaque.
pub const CURVE_SHADOW_TRANSPARENCY_CUTOFF: f32 = 1e-3;

/// RGB throughput carried along a path.
pub type Spectrum = Vec3;

/// Three floats with no alignment padding, the storage form of all vectors in
/// path state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, DeviceCopy)]
pub struct PackedVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PackedVec3 {
    pub const ZERO: PackedVec3 = PackedVec3 { x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        PackedVec3 { x, y, z }
    }
}

impl From<Vec3> for PackedVec3 {
    #[inline]
    fn from(v: Vec3) -> Self {
        PackedVec3 { x: v.x, y: v.y, z: v.z }
    }
}

impl From<PackedVec3> for Vec3 {
    #[inline]
    fn from(v: PackedVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Spectrum in its packed storage form.
pub type PackedSpectrum = PackedVec3;

bitflags! {
    /// Ray visibility mask. An object is skipped during traversal when the
    /// intersection of its visibility word and the ray's is empty.
    ///
    /// The low bits double as the scatter-type bits of [`PathRayFlags`], so a
    /// path's flag word can be used directly as its visibility.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VisibilityFlags: u32 {
        const CAMERA = 1 << 0;
        const REFLECT = 1 << 1;
        const TRANSMIT = 1 << 2;
        const DIFFUSE = 1 << 3;
        const GLOSSY = 1 << 4;
        const SINGULAR = 1 << 5;
        const TRANSPARENT = 1 << 6;
        const VOLUME_SCATTER = 1 << 7;
        /// Shadow ray that may terminate on the first opaque hit.
        const SHADOW_OPAQUE = 1 << 8;
        /// Shadow ray that must collect transparent hits.
        const SHADOW_TRANSPARENT = 1 << 9;

        const SHADOW = Self::SHADOW_OPAQUE.bits() | Self::SHADOW_TRANSPARENT.bits();
        const ALL = (1 << 10) - 1;
    }
}

bitflags! {
    /// Per-path flag word. Bounce-classification bits are shared with
    /// [`VisibilityFlags`]; the rest is lifecycle and pass bookkeeping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PathRayFlags: u32 {
        const CAMERA = 1 << 0;
        const REFLECT = 1 << 1;
        const TRANSMIT = 1 << 2;
        const DIFFUSE = 1 << 3;
        const GLOSSY = 1 << 4;
        const SINGULAR = 1 << 5;
        const TRANSPARENT = 1 << 6;
        const VOLUME_SCATTER = 1 << 7;
        const SHADOW_OPAQUE = 1 << 8;
        const SHADOW_TRANSPARENT = 1 << 9;

        /// Path went through a no-shadow-catcher region and its contribution
        /// must not be double counted.
        const SHADOW_FOR_LIGHT = 1 << 10;
        /// Multiple importance sampling is to be skipped for the next hit.
        const MIS_SKIP = 1 << 11;
        /// A transmission bounce happened somewhere on the path.
        const MIS_HAD_TRANSMISSION = 1 << 12;
        /// Terminate after shading the next surface hit.
        const TERMINATE_ON_NEXT_SURFACE = 1 << 13;
        /// Terminate once the current volume segment is resolved.
        const TERMINATE_IN_NEXT_VOLUME = 1 << 14;
        /// Russian roulette decided termination; gather remaining emission
        /// then stop.
        const TERMINATE_AFTER_TRANSPARENT = 1 << 15;
        /// Either of the deferred-termination hints.
        const TERMINATE = Self::TERMINATE_ON_NEXT_SURFACE.bits()
            | Self::TERMINATE_IN_NEXT_VOLUME.bits()
            | Self::TERMINATE_AFTER_TRANSPARENT.bits();
        /// The path currently carries emission.
        const EMISSION = 1 << 16;
        /// Inside a subsurface random-walk.
        const SUBSURFACE_RANDOM_WALK = 1 << 17;
        /// The background should be treated as transparent.
        const TRANSPARENT_BACKGROUND = 1 << 18;
        /// Denoising feature passes are still being collected.
        const DENOISING_FEATURES = 1 << 19;
        /// Contributions go to the reflect pass.
        const REFLECT_PASS = 1 << 20;
        /// Contributions go to the transmission pass.
        const TRANSMISSION_PASS = 1 << 21;
        /// Contributions go to the volume pass.
        const VOLUME_PASS = 1 << 22;
        const ANY_PASS = Self::REFLECT_PASS.bits()
            | Self::TRANSMISSION_PASS.bits()
            | Self::VOLUME_PASS.bits();
        /// This shadow ray is for a shadow-catcher object.
        const SHADOW_CATCHER_HIT = 1 << 23;
        /// Path spawned by a shadow-catcher split; accumulates into the
        /// catcher pass only.
        const SHADOW_CATCHER_PASS = 1 << 24;
        /// Background behind a shadow catcher.
        const SHADOW_CATCHER_BACKGROUND = 1 << 25;
    }
}

impl PathRayFlags {
    /// The visibility word this path traces with.
    #[inline]
    pub fn visibility(self) -> VisibilityFlags {
        VisibilityFlags::from_bits_truncate(self.bits())
    }
}

bitflags! {
    /// Precomputed per-shader capability word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShaderFlags: u32 {
        /// Shadow rays may pass through this shader with attenuation.
        const HAS_TRANSPARENT_SHADOW = 1 << 0;
        /// The shader has a volume closure.
        const HAS_VOLUME = 1 << 1;
        /// The shader has *only* volume closures, no surface part.
        const HAS_ONLY_VOLUME = 1 << 2;
        /// Volume extinction is uniform across the volume.
        const HOMOGENEOUS_VOLUME = 1 << 3;
        /// The shader runs raytrace nodes and must go through the dedicated
        /// shade-surface-raytrace kernel.
        const HAS_RAYTRACE = 1 << 4;
        /// Surface emission.
        const HAS_EMISSION = 1 << 5;
        /// BSSRDF closures present.
        const HAS_BSSRDF_BUMP = 1 << 6;
        /// Needs volume attributes fetched per step.
        const HAS_VOLUME_ATTRIBUTES = 1 << 7;
        /// Bump mapping present.
        const HAS_BUMP = 1 << 8;
        /// Shader reads ray-differential state.
        const HAS_SURFACE_SPATIAL_VARYING = 1 << 9;
    }
}

bitflags! {
    /// Precomputed per-object capability word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u32 {
        /// Object participates in the holdout pass.
        const HOLDOUT_MASK = 1 << 0;
        /// Object has motion-blurred transforms.
        const MOTION = 1 << 1;
        /// Geometry is stored in world space.
        const TRANSFORM_APPLIED = 1 << 2;
        /// Object transform mirrors handedness.
        const NEGATIVE_SCALE = 1 << 3;
        /// Any shader on the object has a volume closure.
        const HAS_VOLUME = 1 << 4;
        /// Volume shaders need per-object attribute lookups.
        const HAS_VOLUME_ATTRIBUTES = 1 << 5;
        /// Object is a shadow catcher.
        const SHADOW_CATCHER = 1 << 6;
        /// Object casts caustics via MNEE.
        const CAUSTICS_CASTER = 1 << 7;
        /// Object receives caustics via MNEE.
        const CAUSTICS_RECEIVER = 1 << 8;
    }
}

bitflags! {
    /// Primitive classification of an intersection, stored raw in
    /// [`Intersection::kind`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrimitiveKind: u32 {
        const TRIANGLE = 1 << 0;
        const MOTION_TRIANGLE = 1 << 1;
        const CURVE_THICK = 1 << 2;
        const CURVE_RIBBON = 1 << 3;
        const POINT = 1 << 4;
        const LAMP = 1 << 5;

        const CURVE = Self::CURVE_THICK.bits() | Self::CURVE_RIBBON.bits();
        const ALL_TRIANGLE = Self::TRIANGLE.bits() | Self::MOTION_TRIANGLE.bits();
    }
}

/// Primitives the ray must not report hits against, to avoid
/// self-intersection at the scatter point and double-counting the sampled
/// light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, DeviceCopy)]
pub struct RaySelf {
    pub object: i32,
    pub prim: i32,
    pub light_object: i32,
    pub light_prim: i32,
}

impl RaySelf {
    pub const NONE: RaySelf = RaySelf {
        object: OBJECT_NONE,
        prim: PRIM_NONE,
        light_object: OBJECT_NONE,
        light_prim: PRIM_NONE,
    };
}

impl Default for RaySelf {
    fn default() -> Self {
        RaySelf::NONE
    }
}

/// One segment to trace. Derived fresh from path state before each traversal
/// and never persisted across kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub p: Vec3,
    pub d: Vec3,
    pub tmin: f32,
    pub tmax: f32,
    /// Motion-blur time in `[0, 1]`.
    pub time: f32,
    /// Ray-differential scale at the origin.
    pub dp: f32,
    /// Ray-differential scale of the direction.
    pub dd: f32,
    pub self_prims: RaySelf,
}

impl Default for Ray {
    fn default() -> Self {
        Ray {
            p: Vec3::ZERO,
            d: Vec3::ZERO,
            tmin: 0.0,
            tmax: f32::INFINITY,
            time: 0.0,
            dp: 0.0,
            dd: 0.0,
            self_prims: RaySelf::NONE,
        }
    }
}

/// Result of a BVH query. For primary rays only the closest hit survives; for
/// shadow rays an array of these is recorded per ray.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, DeviceCopy)]
pub struct Intersection {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub prim: i32,
    pub object: i32,
    /// Raw [`PrimitiveKind`] bits.
    pub kind: u32,
}

impl Intersection {
    pub const NONE: Intersection = Intersection {
        t: 0.0,
        u: 0.0,
        v: 0.0,
        prim: PRIM_NONE,
        object: OBJECT_NONE,
        kind: 0,
    };

    #[inline]
    pub fn primitive_kind(&self) -> PrimitiveKind {
        PrimitiveKind::from_bits_truncate(self.kind)
    }

    #[inline]
    pub fn is_curve(&self) -> bool {
        self.primitive_kind().intersects(PrimitiveKind::CURVE)
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Intersection::NONE
    }
}

/// One nested volume the ray is currently inside. A stack of these is
/// terminated by an entry with `shader == SHADER_NONE`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable, DeviceCopy)]
pub struct VolumeStackEntry {
    pub object: i32,
    pub shader: i32,
}

impl VolumeStackEntry {
    /// The stack terminator.
    pub const SENTINEL: VolumeStackEntry = VolumeStackEntry {
        object: OBJECT_NONE,
        shader: SHADER_NONE,
    };
}

impl Default for VolumeStackEntry {
    fn default() -> Self {
        VolumeStackEntry::SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, size_of};

    #[test]
    fn packed_vec3_is_tight() {
        assert_eq!(size_of::<PackedVec3>(), 12);
        assert_eq!(align_of::<PackedVec3>(), 4);
    }

    #[test]
    fn intersection_layout() {
        assert_eq!(size_of::<Intersection>(), 24);
        assert_eq!(size_of::<VolumeStackEntry>(), 8);
        assert_eq!(size_of::<RaySelf>(), 16);
    }

    #[test]
    fn path_flags_project_to_visibility() {
        let flag = PathRayFlags::CAMERA
            | PathRayFlags::TRANSPARENT_BACKGROUND
            | PathRayFlags::DIFFUSE;
        assert_eq!(
            flag.visibility(),
            VisibilityFlags::CAMERA | VisibilityFlags::DIFFUSE
        );
    }

    #[test]
    fn curve_kind_classification() {
        let mut isect = Intersection::NONE;
        isect.kind = PrimitiveKind::CURVE_RIBBON.bits();
        assert!(isect.is_curve());
        isect.kind = PrimitiveKind::TRIANGLE.bits();
        assert!(!isect.is_curve());
    }

    #[test]
    fn volume_sentinel_terminates() {
        assert_eq!(VolumeStackEntry::default(), VolumeStackEntry::SENTINEL);
        assert_eq!(VolumeStackEntry::SENTINEL.shader, SHADER_NONE);
    }
}
