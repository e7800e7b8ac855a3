//! The CPU layout: one contiguous record per path.
//!
//! Each render worker thread owns one [`IntegratorStateCpu`] and walks its
//! path to completion before starting the next, so the whole record lives in
//! cache for the duration. The shadow and ambient-occlusion sub-states are
//! embedded directly: a CPU path reaches its shadow state without a separate
//! allocation or a slot allocator.
//!
//! Fields mirror the schema in `wavefront_core::schema` one for one; the
//! cross-check test in `soa.rs` keeps all three in agreement.

use bytemuck::Zeroable;
use cust_core::DeviceCopy;
use glam::Vec3;

use wavefront_core::types::{
    Intersection, PackedSpectrum, PackedVec3, Ray, RaySelf, VolumeStackEntry,
    INTEGRATOR_SHADOW_ISECT_SIZE_CPU, MAX_VOLUME_STACK_SIZE,
};
use wavefront_core::KernelFeatures;

use crate::kernel::DeviceKernel;
use crate::ops::ShadowIsectArray;

/// Bookkeeping of one in-flight camera path.
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct PathStateCpu {
    pub render_pixel_index: u32,
    pub rng_pixel: u32,
    pub rng_offset: u32,
    pub sample: u32,
    pub bounce: u16,
    pub diffuse_bounce: u16,
    pub glossy_bounce: u16,
    pub transmission_bounce: u16,
    pub transparent_bounce: u16,
    pub volume_bounce: u16,
    pub volume_bounds_bounce: u16,
    pub queued_kernel: u16,
    pub flag: u32,
    pub mis_ray_pdf: f32,
    pub min_ray_pdf: f32,
    pub continuation_probability: f32,
    pub throughput: PackedSpectrum,
    pub mis_origin_n: PackedVec3,
    pub mis_ray_object: i32,
    pub optical_depth: f32,
    #[cfg(feature = "path-guiding")]
    pub unguided_throughput: f32,
    pub pass_diffuse_weight: f32,
    pub pass_glossy_weight: f32,
}

/// The segment the path traces next.
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct RayStateCpu {
    pub p: PackedVec3,
    pub d: PackedVec3,
    pub tmin: f32,
    pub tmax: f32,
    pub time: f32,
    pub dp: f32,
    pub dd: f32,
    pub previous_dt: f32,
}

/// Subsurface-scattering scratch state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct SubsurfaceStateCpu {
    pub albedo: PackedSpectrum,
}

/// Path-guiding scratch state.
#[cfg(feature = "path-guiding")]
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct GuidingStateCpu {
    /// Opaque id of the guiding library's current path segment.
    pub path_segment: u64,
    pub use_surface_guiding: u32,
    pub use_volume_guiding: u32,
    pub sample_surface_guiding_rand: f32,
    pub sample_volume_guiding_rand: f32,
}

/// Dedicated-light (shadow linking) scratch state.
#[cfg(feature = "shadow-linking")]
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct ShadowLinkStateCpu {
    pub dedicated_light_weight: f32,
    pub last_throughput: PackedSpectrum,
}

/// Bookkeeping of one shadow ray in flight.
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct ShadowPathStateCpu {
    pub render_pixel_index: u32,
    pub rng_pixel: u32,
    pub rng_offset: u32,
    pub sample: u32,
    pub flag: u32,
    pub queued_kernel: u16,
    pub bounce: u16,
    pub diffuse_bounce: u16,
    pub glossy_bounce: u16,
    pub transmission_bounce: u16,
    pub transparent_bounce: u16,
    pub volume_bounds_bounce: u16,
    pub pad: u16,
    pub num_hits: u32,
    pub throughput: PackedSpectrum,
    pub unshadowed_throughput: PackedSpectrum,
    pub unlit_throughput: PackedSpectrum,
    pub pass_diffuse_weight: f32,
    pub pass_glossy_weight: f32,
    pub lightgroup: u32,
    #[cfg(feature = "path-guiding")]
    pub guiding_mis_weight: f32,
    #[cfg(feature = "path-guiding")]
    pub path_segment: u64,
}

/// The shadow segment, with its self-intersection exclusions. The direction
/// differential is not stored: shadow shading reads it back as a canonical
/// zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable, DeviceCopy)]
pub struct ShadowRayStateCpu {
    pub p: PackedVec3,
    pub d: PackedVec3,
    pub tmin: f32,
    pub tmax: f32,
    pub time: f32,
    pub dp: f32,
    pub self_object: i32,
    pub self_prim: i32,
    pub self_light_object: i32,
    pub self_light_prim: i32,
}

/// Shadow or ambient-occlusion sub-state embedded in a CPU path.
#[repr(C)]
#[derive(Clone, Copy, Zeroable, DeviceCopy)]
pub struct IntegratorShadowStateCpu {
    pub shadow_path: ShadowPathStateCpu,
    pub shadow_ray: ShadowRayStateCpu,
    pub shadow_isect: [Intersection; INTEGRATOR_SHADOW_ISECT_SIZE_CPU],
    pub shadow_volume_stack: [VolumeStackEntry; MAX_VOLUME_STACK_SIZE],
}

/// Complete per-path state in the array-of-structs layout.
#[repr(C)]
#[derive(Clone, Copy, Zeroable, DeviceCopy)]
pub struct IntegratorStateCpu {
    pub path: PathStateCpu,
    pub ray: RayStateCpu,
    pub isect: Intersection,
    pub subsurface: SubsurfaceStateCpu,
    pub volume_stack: [VolumeStackEntry; MAX_VOLUME_STACK_SIZE],
    #[cfg(feature = "path-guiding")]
    pub guiding: GuidingStateCpu,
    #[cfg(feature = "shadow-linking")]
    pub shadow_link: ShadowLinkStateCpu,
    pub shadow: IntegratorShadowStateCpu,
    pub ao: IntegratorShadowStateCpu,
}

impl IntegratorStateCpu {
    /// A zeroed record; every slot starts dead (`queued_kernel == 0`).
    pub fn new() -> Box<IntegratorStateCpu> {
        // Too large for the stack of a deeply nested caller in debug builds,
        // so it goes straight to the heap.
        let mut state: Box<IntegratorStateCpu> = bytemuck::zeroed_box();
        state.reset_volume_stacks();
        state
    }

    fn reset_volume_stacks(&mut self) {
        self.volume_stack = [VolumeStackEntry::SENTINEL; MAX_VOLUME_STACK_SIZE];
        self.shadow.shadow_volume_stack = [VolumeStackEntry::SENTINEL; MAX_VOLUME_STACK_SIZE];
        self.ao.shadow_volume_stack = [VolumeStackEntry::SENTINEL; MAX_VOLUME_STACK_SIZE];
    }

    /// Starts a fresh camera path in this record.
    pub fn init_path(&mut self, render_pixel_index: u32, sample: u32, rng_pixel: u32) {
        let path = &mut self.path;
        *path = PathStateCpu::zeroed();
        path.render_pixel_index = render_pixel_index;
        path.sample = sample;
        path.rng_pixel = rng_pixel;
        path.flag = wavefront_core::PathRayFlags::CAMERA.bits();
        path.throughput = PackedSpectrum::new(1.0, 1.0, 1.0);
        path.min_ray_pdf = f32::MAX;
        path.continuation_probability = 1.0;
        path.mis_ray_object = wavefront_core::OBJECT_NONE;
        path.queued_kernel = DeviceKernel::IntersectClosest.queue_mask();
        self.reset_volume_stacks();
    }

    /// Writes the next segment of the main path.
    pub fn write_ray(&mut self, ray: &Ray) {
        let r = &mut self.ray;
        r.p = ray.p.into();
        r.d = ray.d.into();
        r.tmin = ray.tmin;
        r.tmax = ray.tmax;
        r.time = ray.time;
        r.dp = ray.dp;
        r.dd = ray.dd;
    }

    /// Reads the main-path segment back. Self-intersection exclusions are
    /// not part of ray state; the intersect kernel derives them from the
    /// last recorded hit.
    pub fn read_ray(&self) -> Ray {
        let r = &self.ray;
        Ray {
            p: r.p.into(),
            d: r.d.into(),
            tmin: r.tmin,
            tmax: r.tmax,
            time: r.time,
            dp: r.dp,
            dd: r.dd,
            self_prims: RaySelf::NONE,
        }
    }

    pub fn write_isect(&mut self, isect: &Intersection) {
        self.isect = *isect;
    }

    pub fn read_isect(&self) -> Intersection {
        self.isect
    }

    /// Reads one volume-stack entry of the main path.
    #[inline]
    pub fn volume_stack_read(&self, index: usize) -> VolumeStackEntry {
        self.volume_stack[index]
    }

    /// Writes one volume-stack entry of the main path.
    #[inline]
    pub fn volume_stack_write(&mut self, index: usize, entry: VolumeStackEntry) {
        self.volume_stack[index] = entry;
    }

    /// Copies the path's volume stack into a shadow sub-state, terminator
    /// included, so the shadow ray attenuates through the same media.
    pub fn copy_volume_stack_to_shadow(&mut self, features: KernelFeatures, ao: bool) {
        if !features.contains(KernelFeatures::NODE_VOLUME) {
            return;
        }
        let stack = self.volume_stack;
        let target = if ao { &mut self.ao } else { &mut self.shadow };
        for (index, entry) in stack.iter().enumerate() {
            target.shadow_volume_stack[index] = *entry;
            if entry.shader == wavefront_core::SHADER_NONE {
                break;
            }
        }
    }

    /// Duplicates this state into `target` as the shadow-catcher half of a
    /// split. The copy accumulates into the catcher passes only.
    pub fn shadow_catcher_split(&self, target: &mut IntegratorStateCpu) {
        *target = *self;
        target.path.flag |= wavefront_core::PathRayFlags::SHADOW_CATCHER_PASS.bits();
    }

    /// Marks the slot dead.
    pub fn release(&mut self) {
        self.path.queued_kernel = 0;
    }
}

impl IntegratorShadowStateCpu {
    /// Starts a shadow path from its parent, carrying over the sampling
    /// bookkeeping and bounce counts the shadow shading stage needs.
    pub fn init_from_parent(&mut self, parent: &PathStateCpu, throughput: Vec3) {
        let sp = &mut self.shadow_path;
        sp.render_pixel_index = parent.render_pixel_index;
        sp.rng_pixel = parent.rng_pixel;
        sp.rng_offset = parent.rng_offset;
        sp.sample = parent.sample;
        sp.flag = parent.flag;
        sp.bounce = parent.bounce;
        sp.diffuse_bounce = parent.diffuse_bounce;
        sp.glossy_bounce = parent.glossy_bounce;
        sp.transmission_bounce = parent.transmission_bounce;
        sp.transparent_bounce = parent.transparent_bounce;
        sp.volume_bounds_bounce = parent.volume_bounds_bounce;
        sp.throughput = throughput.into();
        sp.num_hits = 0;
        sp.queued_kernel = DeviceKernel::IntersectShadow.queue_mask();
    }

    /// Writes the shadow segment. The direction differential is dropped and
    /// reads back as the canonical zero form.
    pub fn write_shadow_ray(&mut self, ray: &Ray) {
        let r = &mut self.shadow_ray;
        r.p = ray.p.into();
        r.d = ray.d.into();
        r.tmin = ray.tmin;
        r.tmax = ray.tmax;
        r.time = ray.time;
        r.dp = ray.dp;
        r.self_object = ray.self_prims.object;
        r.self_prim = ray.self_prims.prim;
        r.self_light_object = ray.self_prims.light_object;
        r.self_light_prim = ray.self_prims.light_prim;
    }

    pub fn read_shadow_ray(&self) -> Ray {
        let r = &self.shadow_ray;
        Ray {
            p: r.p.into(),
            d: r.d.into(),
            tmin: r.tmin,
            tmax: r.tmax,
            time: r.time,
            dp: r.dp,
            dd: 0.0,
            self_prims: RaySelf {
                object: r.self_object,
                prim: r.self_prim,
                light_object: r.self_light_object,
                light_prim: r.self_light_prim,
            },
        }
    }

    /// Reads one shadow volume-stack entry.
    #[inline]
    pub fn shadow_volume_stack_read(&self, index: usize) -> VolumeStackEntry {
        self.shadow_volume_stack[index]
    }

    /// Marks the shadow slot resolved.
    pub fn release(&mut self) {
        self.shadow_path.queued_kernel = 0;
    }
}

impl ShadowIsectArray for IntegratorShadowStateCpu {
    #[inline]
    fn capacity(&self) -> u32 {
        INTEGRATOR_SHADOW_ISECT_SIZE_CPU as u32
    }

    #[inline]
    fn get(&self, index: u32) -> Intersection {
        self.shadow_isect[index as usize]
    }

    #[inline]
    fn set(&mut self, index: u32, isect: &Intersection) {
        self.shadow_isect[index as usize] = *isect;
    }
}
