//! The GPU layout: one device array per field, indexed by path slot.
//!
//! GPU backends cannot afford the array-of-structs record: adjacent threads
//! work adjacent path slots, so each field must be contiguous across slots
//! for coalesced access. The [`SoaArena`] owns one host array per enabled
//! field and hands the device a [`IntegratorStateGpu`] block of raw pointers
//! into them; a real backend uploads the same arrays to device memory and
//! fills the block with device addresses, the shape is identical.
//!
//! The arena also owns the globally shared bookkeeping: per-stage queue
//! counters, per-shader sort-key counters for coherence sorting, and the two
//! atomic slot allocators that are the only synchronization in the model.
//!
//! Host accessors bounds-check and panic on misuse; device kernels address
//! the pointer block raw and are trusted, exactly as the dispatcher contract
//! demands.

use tracing::debug;

use wavefront_core::schema;
use wavefront_core::types::{
    Intersection, PackedSpectrum, PackedVec3, Ray, RaySelf, VolumeStackEntry,
    INTEGRATOR_SHADOW_ISECT_SIZE_GPU, MAX_VOLUME_STACK_SIZE, OBJECT_NONE, SHADER_NONE,
};
use wavefront_core::{KernelFeatures, PathRayFlags};

use crate::alloc::{IntegratorQueueCounter, QueueCounters, ShaderSortCounters, SlotAllocator};
use crate::error::{StateError, StateResult};
use crate::handle::{PathIndex, ShadowPathIndex};
use crate::kernel::{DeviceKernel, DEVICE_KERNEL_COUNT};
use crate::layout::{soa_array_group, soa_plain_group};
use crate::ops::ShadowIsectArray;

soa_plain_group! {
    /// Bookkeeping of in-flight camera paths.
    group path {
        render_pixel_index: u32 => None,
        rng_pixel: u32 => None,
        rng_offset: u32 => None,
        sample: u32 => None,
        bounce: u16 => None,
        diffuse_bounce: u16 => None,
        glossy_bounce: u16 => None,
        transmission_bounce: u16 => None,
        transparent_bounce: u16 => None,
        volume_bounce: u16 => None,
        volume_bounds_bounce: u16 => None,
        queued_kernel: u16 => None,
        flag: u32 => None,
        mis_ray_pdf: f32 => None,
        min_ray_pdf: f32 => None,
        continuation_probability: f32 => None,
        throughput: PackedSpectrum => None,
        mis_origin_n: PackedVec3 => None,
        mis_ray_object: i32 => None,
        optical_depth: f32 => Some(KernelFeatures::DENOISING),
        #[cfg(feature = "path-guiding")]
        unguided_throughput: f32 => Some(KernelFeatures::PATH_GUIDING),
        pass_diffuse_weight: f32 => Some(KernelFeatures::LIGHT_PASSES),
        pass_glossy_weight: f32 => Some(KernelFeatures::LIGHT_PASSES),
    }
}

soa_plain_group! {
    /// The segment each path traces next.
    group ray {
        p: PackedVec3 => None,
        d: PackedVec3 => None,
        tmin: f32 => None,
        tmax: f32 => None,
        time: f32 => None,
        dp: f32 => None,
        dd: f32 => None,
        previous_dt: f32 => None,
    }
}

soa_plain_group! {
    /// Closest hit of the last traversal.
    group isect {
        t: f32 => None,
        u: f32 => None,
        v: f32 => None,
        prim: i32 => None,
        object: i32 => None,
        kind: u32 => None,
    }
}

soa_plain_group! {
    /// Subsurface-scattering scratch state.
    group subsurface {
        albedo: PackedSpectrum => Some(KernelFeatures::SUBSURFACE),
    }
}

soa_array_group! {
    /// Nested volumes each path is currently inside, sentinel terminated.
    group volume_stack [MAX_VOLUME_STACK_SIZE] {
        object: i32 => Some(KernelFeatures::NODE_VOLUME),
        shader: i32 => Some(KernelFeatures::NODE_VOLUME),
    }
}

#[cfg(feature = "path-guiding")]
soa_plain_group! {
    /// Path-guiding scratch state.
    group guiding {
        path_segment: u64 => Some(KernelFeatures::PATH_GUIDING),
        use_surface_guiding: u32 => Some(KernelFeatures::PATH_GUIDING),
        use_volume_guiding: u32 => Some(KernelFeatures::PATH_GUIDING),
        sample_surface_guiding_rand: f32 => Some(KernelFeatures::PATH_GUIDING),
        sample_volume_guiding_rand: f32 => Some(KernelFeatures::PATH_GUIDING),
    }
}

#[cfg(feature = "shadow-linking")]
soa_plain_group! {
    /// Dedicated-light (shadow linking) scratch state.
    group shadow_link {
        dedicated_light_weight: f32 => Some(KernelFeatures::SHADOW_LINKING),
        last_throughput: PackedSpectrum => Some(KernelFeatures::SHADOW_LINKING),
    }
}

soa_plain_group! {
    /// Bookkeeping of in-flight shadow rays.
    group shadow_path {
        render_pixel_index: u32 => None,
        rng_pixel: u32 => None,
        rng_offset: u32 => None,
        sample: u32 => None,
        flag: u32 => None,
        queued_kernel: u16 => None,
        bounce: u16 => None,
        diffuse_bounce: u16 => None,
        glossy_bounce: u16 => None,
        transmission_bounce: u16 => None,
        transparent_bounce: u16 => None,
        volume_bounds_bounce: u16 => None,
        num_hits: u32 => None,
        throughput: PackedSpectrum => None,
        unshadowed_throughput: PackedSpectrum => Some(KernelFeatures::AO_ADDITIVE),
        unlit_throughput: PackedSpectrum => Some(KernelFeatures::SHADOW_CATCHER),
        pass_diffuse_weight: f32 => Some(KernelFeatures::LIGHT_PASSES),
        pass_glossy_weight: f32 => Some(KernelFeatures::LIGHT_PASSES),
        lightgroup: u32 => Some(KernelFeatures::LIGHT_PASSES),
        #[cfg(feature = "path-guiding")]
        guiding_mis_weight: f32 => Some(KernelFeatures::PATH_GUIDING),
        #[cfg(feature = "path-guiding")]
        path_segment: u64 => Some(KernelFeatures::PATH_GUIDING),
    }
}

soa_plain_group! {
    /// The shadow segment with its self-intersection exclusions.
    group shadow_ray {
        p: PackedVec3 => None,
        d: PackedVec3 => None,
        tmin: f32 => None,
        tmax: f32 => None,
        time: f32 => None,
        dp: f32 => None,
        self_object: i32 => None,
        self_prim: i32 => None,
        self_light_object: i32 => None,
        self_light_prim: i32 => None,
    }
}

soa_array_group! {
    /// Recorded transparent hits of each shadow ray.
    group shadow_isect [INTEGRATOR_SHADOW_ISECT_SIZE_GPU] {
        t: f32 => None,
        u: f32 => None,
        v: f32 => None,
        prim: i32 => None,
        object: i32 => None,
        kind: u32 => None,
    }
}

soa_array_group! {
    /// Volume context carried over to each shadow ray.
    group shadow_volume_stack [MAX_VOLUME_STACK_SIZE] {
        object: i32 => Some(KernelFeatures::NODE_VOLUME),
        shader: i32 => Some(KernelFeatures::NODE_VOLUME),
    }
}

/// Slot counts the dispatcher sized the arena with.
#[derive(Debug, Clone, Copy)]
pub struct SoaSizes {
    /// Main path slots; also the capacity of the main slot allocator.
    pub num_main_paths: usize,
    /// Shadow path slots.
    pub num_shadow_paths: usize,
    /// Shader count, sizing the coherence-sort key counters.
    pub num_shaders: usize,
    /// Partitions of the slot range that sorted active-index lists are
    /// written into, for locality-aware dispatch.
    pub num_sort_partitions: usize,
}

impl SoaSizes {
    pub fn new(num_main_paths: usize, num_shadow_paths: usize, num_shaders: usize) -> SoaSizes {
        SoaSizes {
            num_main_paths,
            num_shadow_paths,
            num_shaders,
            num_sort_partitions: 1,
        }
    }
}

/// The device-visible launch view of the whole state arena.
///
/// Every backend embeds this block into its launch parameters unchanged; the
/// pointers are host addresses here and device addresses there, the layout is
/// the same.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IntegratorStateGpu {
    pub path: PathSoaPtrs,
    pub ray: RaySoaPtrs,
    pub isect: IsectSoaPtrs,
    pub subsurface: SubsurfaceSoaPtrs,
    pub volume_stack: [VolumeStackSoaPtrs; MAX_VOLUME_STACK_SIZE],
    #[cfg(feature = "path-guiding")]
    pub guiding: GuidingSoaPtrs,
    #[cfg(feature = "shadow-linking")]
    pub shadow_link: ShadowLinkSoaPtrs,
    pub shadow_path: ShadowPathSoaPtrs,
    pub shadow_ray: ShadowRaySoaPtrs,
    pub shadow_isect: [ShadowIsectSoaPtrs; INTEGRATOR_SHADOW_ISECT_SIZE_GPU],
    pub shadow_volume_stack: [ShadowVolumeStackSoaPtrs; MAX_VOLUME_STACK_SIZE],
    /// Per-stage queued-path counters.
    pub queue_counter: *mut IntegratorQueueCounter,
    /// Per-shader counters for the stages that sort by shader; null for the
    /// rest.
    pub sort_key_counter: [*mut i32; DEVICE_KERNEL_COUNT],
    /// Lock-free shadow slot allocator counter.
    pub next_shadow_path_index: *mut i32,
    /// Lock-free main slot allocator counter.
    pub next_main_path_index: *mut i32,
    /// Key offsets used when writing sorted active-index lists.
    pub sort_partition_key_offsets: *mut i32,
    /// Divisor mapping a slot index to its sort partition.
    pub sort_partition_divisor: i32,
}

unsafe impl cust_core::DeviceCopy for IntegratorStateGpu {}

/// Host-side owner of the structure-of-arrays state.
#[derive(Debug)]
pub struct SoaArena {
    features: KernelFeatures,
    sizes: SoaSizes,
    pub path: PathSoa,
    pub ray: RaySoa,
    pub isect: IsectSoa,
    pub subsurface: SubsurfaceSoa,
    pub volume_stack: VolumeStackSoa,
    #[cfg(feature = "path-guiding")]
    pub guiding: GuidingSoa,
    #[cfg(feature = "shadow-linking")]
    pub shadow_link: ShadowLinkSoa,
    pub shadow_path: ShadowPathSoa,
    pub shadow_ray: ShadowRaySoa,
    pub shadow_isect: ShadowIsectSoa,
    pub shadow_volume_stack: ShadowVolumeStackSoa,
    queue: QueueCounters,
    next_main: SlotAllocator,
    next_shadow: SlotAllocator,
    sort_counters: [Option<ShaderSortCounters>; DEVICE_KERNEL_COUNT],
    sort_partition_key_offsets: Vec<i32>,
    sort_partition_divisor: i32,
}

impl SoaArena {
    /// Allocates state arrays for `sizes` slots, pruned to `features`.
    pub fn new(features: KernelFeatures, sizes: SoaSizes) -> StateResult<SoaArena> {
        if sizes.num_main_paths == 0 || sizes.num_shadow_paths == 0 {
            return Err(StateError::ZeroCapacity);
        }
        for requested in [sizes.num_main_paths, sizes.num_shadow_paths] {
            if requested > i32::MAX as usize {
                return Err(StateError::CapacityOverflow { requested });
            }
        }
        if sizes.num_sort_partitions == 0
            || sizes.num_main_paths % sizes.num_sort_partitions != 0
        {
            return Err(StateError::InvalidPartition {
                num_slots: sizes.num_main_paths,
                partitions: sizes.num_sort_partitions,
            });
        }

        let main_bytes: usize = schema::MAIN_GROUPS
            .iter()
            .map(|g| g.bytes_per_slot(features, true))
            .sum();
        let shadow_bytes: usize = schema::SHADOW_GROUPS
            .iter()
            .map(|g| g.bytes_per_slot(features, true))
            .sum();
        debug!(
            num_main_paths = sizes.num_main_paths,
            num_shadow_paths = sizes.num_shadow_paths,
            main_bytes_per_slot = main_bytes,
            shadow_bytes_per_slot = shadow_bytes,
            "allocating integrator state arena"
        );

        let sort_counters = core::array::from_fn(|i| {
            DeviceKernel::ALL[i]
                .sorts_by_shader()
                .then(|| ShaderSortCounters::new(sizes.num_shaders))
        });

        Ok(SoaArena {
            features,
            sizes,
            path: PathSoa::alloc(features, sizes.num_main_paths),
            ray: RaySoa::alloc(features, sizes.num_main_paths),
            isect: IsectSoa::alloc(features, sizes.num_main_paths),
            subsurface: SubsurfaceSoa::alloc(features, sizes.num_main_paths),
            volume_stack: VolumeStackSoa::alloc(features, sizes.num_main_paths),
            #[cfg(feature = "path-guiding")]
            guiding: GuidingSoa::alloc(features, sizes.num_main_paths),
            #[cfg(feature = "shadow-linking")]
            shadow_link: ShadowLinkSoa::alloc(features, sizes.num_main_paths),
            shadow_path: ShadowPathSoa::alloc(features, sizes.num_shadow_paths),
            shadow_ray: ShadowRaySoa::alloc(features, sizes.num_shadow_paths),
            shadow_isect: ShadowIsectSoa::alloc(features, sizes.num_shadow_paths),
            shadow_volume_stack: ShadowVolumeStackSoa::alloc(features, sizes.num_shadow_paths),
            queue: QueueCounters::new(),
            next_main: SlotAllocator::new(sizes.num_main_paths as u32),
            next_shadow: SlotAllocator::new(sizes.num_shadow_paths as u32),
            sort_counters,
            sort_partition_key_offsets: vec![
                0;
                sizes.num_sort_partitions * sizes.num_shaders + 1
            ],
            sort_partition_divisor: (sizes.num_main_paths / sizes.num_sort_partitions) as i32,
        })
    }

    #[inline]
    pub fn features(&self) -> KernelFeatures {
        self.features
    }

    #[inline]
    pub fn sizes(&self) -> SoaSizes {
        self.sizes
    }

    pub fn queue_counters(&self) -> &QueueCounters {
        &self.queue
    }

    pub fn shader_sort_counters(&self, kernel: DeviceKernel) -> Option<&ShaderSortCounters> {
        self.sort_counters[kernel as usize].as_ref()
    }

    /// Claims a fresh main path slot.
    pub fn alloc_main_path(&self) -> Option<PathIndex> {
        self.next_main.alloc().map(PathIndex::new)
    }

    /// Claims a fresh shadow path slot.
    pub fn alloc_shadow_path(&self) -> Option<ShadowPathIndex> {
        self.next_shadow.alloc().map(ShadowPathIndex::new)
    }

    pub fn main_allocator(&self) -> &SlotAllocator {
        &self.next_main
    }

    pub fn shadow_allocator(&self) -> &SlotAllocator {
        &self.next_shadow
    }

    /// Builds the device-visible pointer block over the current allocations.
    pub fn device_state(&mut self) -> IntegratorStateGpu {
        let sort_key_counter = core::array::from_fn(|i| {
            self.sort_counters[i]
                .as_ref()
                .map_or(core::ptr::null_mut(), |c| c.device_ptr())
        });
        IntegratorStateGpu {
            path: self.path.ptrs(),
            ray: self.ray.ptrs(),
            isect: self.isect.ptrs(),
            subsurface: self.subsurface.ptrs(),
            volume_stack: self.volume_stack.ptrs(),
            #[cfg(feature = "path-guiding")]
            guiding: self.guiding.ptrs(),
            #[cfg(feature = "shadow-linking")]
            shadow_link: self.shadow_link.ptrs(),
            shadow_path: self.shadow_path.ptrs(),
            shadow_ray: self.shadow_ray.ptrs(),
            shadow_isect: self.shadow_isect.ptrs(),
            shadow_volume_stack: self.shadow_volume_stack.ptrs(),
            queue_counter: self.queue.device_ptr(),
            sort_key_counter,
            next_shadow_path_index: self.next_shadow.counter_ptr(),
            next_main_path_index: self.next_main.counter_ptr(),
            sort_partition_key_offsets: self.sort_partition_key_offsets.as_mut_ptr(),
            sort_partition_divisor: self.sort_partition_divisor,
        }
    }

    /// Starts a fresh camera path in `slot`.
    pub fn init_main_path(
        &mut self,
        slot: PathIndex,
        render_pixel_index: u32,
        sample: u32,
        rng_pixel: u32,
    ) {
        let i = slot.index();
        self.path.set_render_pixel_index(i, render_pixel_index);
        self.path.set_rng_pixel(i, rng_pixel);
        self.path.set_rng_offset(i, 0);
        self.path.set_sample(i, sample);
        self.path.set_bounce(i, 0);
        self.path.set_diffuse_bounce(i, 0);
        self.path.set_glossy_bounce(i, 0);
        self.path.set_transmission_bounce(i, 0);
        self.path.set_transparent_bounce(i, 0);
        self.path.set_volume_bounce(i, 0);
        self.path.set_volume_bounds_bounce(i, 0);
        self.path.set_flag(i, PathRayFlags::CAMERA.bits());
        self.path.set_mis_ray_pdf(i, 0.0);
        self.path.set_min_ray_pdf(i, f32::MAX);
        self.path.set_continuation_probability(i, 1.0);
        self.path.set_throughput(i, PackedSpectrum::new(1.0, 1.0, 1.0));
        self.path.set_mis_origin_n(i, PackedVec3::ZERO);
        self.path.set_mis_ray_object(i, OBJECT_NONE);
        if self.features.contains(KernelFeatures::NODE_VOLUME) {
            for element in 0..VolumeStackSoa::CAPACITY {
                self.volume_stack.set_object(element, i, OBJECT_NONE);
                self.volume_stack.set_shader(element, i, SHADER_NONE);
            }
        }
        self.set_queued_kernel(slot, DeviceKernel::IntersectClosest);
    }

    /// Requeues a live path for its next stage, maintaining the queue
    /// counters.
    pub fn set_queued_kernel(&mut self, slot: PathIndex, kernel: DeviceKernel) {
        let i = slot.index();
        if let Some(previous) = DeviceKernel::from_queue_mask(self.path.queued_kernel(i)) {
            self.queue.decrement(previous);
        }
        self.path.set_queued_kernel(i, kernel.queue_mask());
        self.queue.increment(kernel);
    }

    /// Marks a main path slot dead.
    pub fn release_main_path(&mut self, slot: PathIndex) {
        let i = slot.index();
        if let Some(previous) = DeviceKernel::from_queue_mask(self.path.queued_kernel(i)) {
            self.queue.decrement(previous);
        }
        self.path.set_queued_kernel(i, 0);
    }

    /// Requeues a live shadow path for its next stage, maintaining the
    /// queue counters.
    pub fn set_shadow_queued_kernel(&mut self, slot: ShadowPathIndex, kernel: DeviceKernel) {
        let i = slot.index();
        if let Some(previous) = DeviceKernel::from_queue_mask(self.shadow_path.queued_kernel(i)) {
            self.queue.decrement(previous);
        }
        self.shadow_path.set_queued_kernel(i, kernel.queue_mask());
        self.queue.increment(kernel);
    }

    /// Marks a shadow path slot resolved.
    pub fn release_shadow_path(&mut self, slot: ShadowPathIndex) {
        let i = slot.index();
        if let Some(previous) = DeviceKernel::from_queue_mask(self.shadow_path.queued_kernel(i)) {
            self.queue.decrement(previous);
        }
        self.shadow_path.set_queued_kernel(i, 0);
    }

    /// Writes the next segment of a main path.
    pub fn write_ray(&mut self, slot: PathIndex, ray: &Ray) {
        let i = slot.index();
        self.ray.set_p(i, ray.p.into());
        self.ray.set_d(i, ray.d.into());
        self.ray.set_tmin(i, ray.tmin);
        self.ray.set_tmax(i, ray.tmax);
        self.ray.set_time(i, ray.time);
        self.ray.set_dp(i, ray.dp);
        self.ray.set_dd(i, ray.dd);
    }

    /// Reads a main-path segment back.
    pub fn read_ray(&self, slot: PathIndex) -> Ray {
        let i = slot.index();
        Ray {
            p: self.ray.p(i).into(),
            d: self.ray.d(i).into(),
            tmin: self.ray.tmin(i),
            tmax: self.ray.tmax(i),
            time: self.ray.time(i),
            dp: self.ray.dp(i),
            dd: self.ray.dd(i),
            self_prims: RaySelf::NONE,
        }
    }

    /// Writes the shadow segment. The direction differential is dropped and
    /// reads back as the canonical zero form.
    pub fn write_shadow_ray(&mut self, slot: ShadowPathIndex, ray: &Ray) {
        let i = slot.index();
        self.shadow_ray.set_p(i, ray.p.into());
        self.shadow_ray.set_d(i, ray.d.into());
        self.shadow_ray.set_tmin(i, ray.tmin);
        self.shadow_ray.set_tmax(i, ray.tmax);
        self.shadow_ray.set_time(i, ray.time);
        self.shadow_ray.set_dp(i, ray.dp);
        self.shadow_ray.set_self_object(i, ray.self_prims.object);
        self.shadow_ray.set_self_prim(i, ray.self_prims.prim);
        self.shadow_ray
            .set_self_light_object(i, ray.self_prims.light_object);
        self.shadow_ray
            .set_self_light_prim(i, ray.self_prims.light_prim);
    }

    pub fn read_shadow_ray(&self, slot: ShadowPathIndex) -> Ray {
        let i = slot.index();
        Ray {
            p: self.shadow_ray.p(i).into(),
            d: self.shadow_ray.d(i).into(),
            tmin: self.shadow_ray.tmin(i),
            tmax: self.shadow_ray.tmax(i),
            time: self.shadow_ray.time(i),
            dp: self.shadow_ray.dp(i),
            dd: 0.0,
            self_prims: RaySelf {
                object: self.shadow_ray.self_object(i),
                prim: self.shadow_ray.self_prim(i),
                light_object: self.shadow_ray.self_light_object(i),
                light_prim: self.shadow_ray.self_light_prim(i),
            },
        }
    }

    pub fn write_isect(&mut self, slot: PathIndex, isect: &Intersection) {
        let i = slot.index();
        self.isect.set_t(i, isect.t);
        self.isect.set_u(i, isect.u);
        self.isect.set_v(i, isect.v);
        self.isect.set_prim(i, isect.prim);
        self.isect.set_object(i, isect.object);
        self.isect.set_kind(i, isect.kind);
    }

    pub fn read_isect(&self, slot: PathIndex) -> Intersection {
        let i = slot.index();
        Intersection {
            t: self.isect.t(i),
            u: self.isect.u(i),
            v: self.isect.v(i),
            prim: self.isect.prim(i),
            object: self.isect.object(i),
            kind: self.isect.kind(i),
        }
    }

    /// Reads one volume-stack entry of a main path.
    pub fn volume_stack_read(&self, slot: PathIndex, element: usize) -> VolumeStackEntry {
        let i = slot.index();
        VolumeStackEntry {
            object: self.volume_stack.object(element, i),
            shader: self.volume_stack.shader(element, i),
        }
    }

    /// Writes one volume-stack entry of a main path.
    pub fn volume_stack_write(
        &mut self,
        slot: PathIndex,
        element: usize,
        entry: VolumeStackEntry,
    ) {
        let i = slot.index();
        self.volume_stack.set_object(element, i, entry.object);
        self.volume_stack.set_shader(element, i, entry.shader);
    }

    /// Reads one shadow volume-stack entry.
    pub fn shadow_volume_stack_read(
        &self,
        slot: ShadowPathIndex,
        element: usize,
    ) -> VolumeStackEntry {
        let i = slot.index();
        VolumeStackEntry {
            object: self.shadow_volume_stack.object(element, i),
            shader: self.shadow_volume_stack.shader(element, i),
        }
    }

    /// Copies a path's volume stack to a shadow path, terminator included,
    /// so the shadow ray attenuates through the same media.
    pub fn copy_volume_stack_to_shadow(&mut self, to: ShadowPathIndex, from: PathIndex) {
        if !self.features.contains(KernelFeatures::NODE_VOLUME) {
            return;
        }
        let src = from.index();
        let dst = to.index();
        for element in 0..VolumeStackSoa::CAPACITY {
            let object = self.volume_stack.object(element, src);
            let shader = self.volume_stack.shader(element, src);
            self.shadow_volume_stack.set_object(element, dst, object);
            self.shadow_volume_stack.set_shader(element, dst, shader);
            if shader == SHADER_NONE {
                break;
            }
        }
    }

    /// Starts a shadow path from its parent, carrying over the sampling
    /// bookkeeping and bounce counts the shadow shading stage needs.
    pub fn init_shadow_path(
        &mut self,
        slot: ShadowPathIndex,
        parent: PathIndex,
        throughput: glam::Vec3,
    ) {
        let i = slot.index();
        let p = parent.index();
        self.shadow_path
            .set_render_pixel_index(i, self.path.render_pixel_index(p));
        self.shadow_path.set_rng_pixel(i, self.path.rng_pixel(p));
        self.shadow_path.set_rng_offset(i, self.path.rng_offset(p));
        self.shadow_path.set_sample(i, self.path.sample(p));
        self.shadow_path.set_flag(i, self.path.flag(p));
        self.shadow_path.set_bounce(i, self.path.bounce(p));
        self.shadow_path
            .set_diffuse_bounce(i, self.path.diffuse_bounce(p));
        self.shadow_path
            .set_glossy_bounce(i, self.path.glossy_bounce(p));
        self.shadow_path
            .set_transmission_bounce(i, self.path.transmission_bounce(p));
        self.shadow_path
            .set_transparent_bounce(i, self.path.transparent_bounce(p));
        self.shadow_path
            .set_volume_bounds_bounce(i, self.path.volume_bounds_bounce(p));
        self.shadow_path.set_num_hits(i, 0);
        self.shadow_path.set_throughput(i, throughput.into());
        if self.features.contains(KernelFeatures::LIGHT_PASSES) {
            self.shadow_path
                .set_pass_diffuse_weight(i, self.path.pass_diffuse_weight(p));
            self.shadow_path
                .set_pass_glossy_weight(i, self.path.pass_glossy_weight(p));
        }
        #[cfg(feature = "path-guiding")]
        if self.features.contains(KernelFeatures::PATH_GUIDING) {
            self.shadow_path.set_guiding_mis_weight(i, 0.0);
            self.shadow_path
                .set_path_segment(i, self.guiding.path_segment(p));
        }
        self.shadow_path
            .set_queued_kernel(i, DeviceKernel::IntersectShadow.queue_mask());
        self.queue.increment(DeviceKernel::IntersectShadow);
        self.copy_volume_stack_to_shadow(slot, parent);
    }

    fn copy_main_slot(&mut self, to: usize, from: usize) {
        self.path.copy_slot(to, from);
        self.ray.copy_slot(to, from);
        self.isect.copy_slot(to, from);
        self.subsurface.copy_slot(to, from);
        self.volume_stack.copy_slot(to, from);
        #[cfg(feature = "path-guiding")]
        self.guiding.copy_slot(to, from);
        #[cfg(feature = "shadow-linking")]
        self.shadow_link.copy_slot(to, from);
    }

    /// Splits a shadow-catcher path: claims a fresh main slot, duplicates
    /// the whole state into it, and tags the copy to accumulate into the
    /// catcher passes only. Returns `None` when the slot range is exhausted.
    pub fn shadow_catcher_split(&mut self, slot: PathIndex) -> Option<PathIndex> {
        debug_assert!(self.features.contains(KernelFeatures::SHADOW_CATCHER));
        let split = self.alloc_main_path()?;
        self.copy_main_slot(split.index(), slot.index());
        let flag = self.path.flag(split.index()) | PathRayFlags::SHADOW_CATCHER_PASS.bits();
        self.path.set_flag(split.index(), flag);
        if let Some(kernel) = DeviceKernel::from_queue_mask(self.path.queued_kernel(split.index()))
        {
            self.queue.increment(kernel);
        }
        Some(split)
    }

    /// Compaction primitive: moves a live main path into a dense target slot
    /// and marks the source dead. Queue counters are unchanged, the path is
    /// still queued for the same stage.
    pub fn state_move(&mut self, to: PathIndex, from: PathIndex) {
        self.copy_main_slot(to.index(), from.index());
        self.path.set_queued_kernel(from.index(), 0);
    }

    /// Compaction primitive for shadow paths.
    pub fn shadow_state_move(&mut self, to: ShadowPathIndex, from: ShadowPathIndex) {
        self.shadow_path.copy_slot(to.index(), from.index());
        self.shadow_ray.copy_slot(to.index(), from.index());
        self.shadow_isect.copy_slot(to.index(), from.index());
        self.shadow_volume_stack.copy_slot(to.index(), from.index());
        self.shadow_path.set_queued_kernel(from.index(), 0);
    }

    /// The bounded transparent-hit record array of one shadow path.
    pub fn shadow_isect_slots(&mut self, slot: ShadowPathIndex) -> SoaShadowIsect<'_> {
        SoaShadowIsect {
            soa: &mut self.shadow_isect,
            slot: slot.index(),
        }
    }
}

/// One shadow path's view of the SoA transparent-hit records.
pub struct SoaShadowIsect<'a> {
    soa: &'a mut ShadowIsectSoa,
    slot: usize,
}

impl ShadowIsectArray for SoaShadowIsect<'_> {
    #[inline]
    fn capacity(&self) -> u32 {
        ShadowIsectSoa::CAPACITY as u32
    }

    #[inline]
    fn get(&self, index: u32) -> Intersection {
        let element = index as usize;
        Intersection {
            t: self.soa.t(element, self.slot),
            u: self.soa.u(element, self.slot),
            v: self.soa.v(element, self.slot),
            prim: self.soa.prim(element, self.slot),
            object: self.soa.object(element, self.slot),
            kind: self.soa.kind(element, self.slot),
        }
    }

    #[inline]
    fn set(&mut self, index: u32, isect: &Intersection) {
        let element = index as usize;
        self.soa.set_t(element, self.slot, isect.t);
        self.soa.set_u(element, self.slot, isect.u);
        self.soa.set_v(element, self.slot, isect.v);
        self.soa.set_prim(element, self.slot, isect.prim);
        self.soa.set_object(element, self.slot, isect.object);
        self.soa.set_kind(element, self.slot, isect.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn test_features() -> KernelFeatures {
        KernelFeatures::PATH_TRACING
            | KernelFeatures::NODE_VOLUME
            | KernelFeatures::SHADOW_CATCHER
            | KernelFeatures::TRANSPARENT
    }

    fn test_arena() -> SoaArena {
        SoaArena::new(test_features(), SoaSizes::new(64, 64, 8)).unwrap()
    }

    #[test]
    fn rejects_degenerate_sizes() {
        assert_eq!(
            SoaArena::new(test_features(), SoaSizes::new(0, 4, 1)).unwrap_err(),
            StateError::ZeroCapacity
        );
        let mut sizes = SoaSizes::new(10, 10, 1);
        sizes.num_sort_partitions = 3;
        assert!(matches!(
            SoaArena::new(test_features(), sizes).unwrap_err(),
            StateError::InvalidPartition { .. }
        ));
    }

    #[test]
    fn ray_roundtrip() {
        let mut arena = test_arena();
        let slot = arena.alloc_main_path().unwrap();
        let ray = Ray {
            p: Vec3::new(1.0, 2.0, 3.0),
            d: Vec3::new(0.0, 1.0, 0.0),
            tmin: 0.001,
            tmax: 42.0,
            time: 0.5,
            dp: 0.1,
            dd: 0.2,
            self_prims: RaySelf::NONE,
        };
        arena.write_ray(slot, &ray);
        assert_eq!(arena.read_ray(slot), ray);
    }

    #[test]
    fn shadow_ray_roundtrip_resets_direction_differential() {
        let mut arena = test_arena();
        let slot = arena.alloc_shadow_path().unwrap();
        let ray = Ray {
            p: Vec3::new(4.0, 5.0, 6.0),
            d: Vec3::new(0.0, 0.0, -1.0),
            tmin: 0.0,
            tmax: 9.0,
            time: 0.75,
            dp: 0.3,
            dd: 0.9,
            self_prims: RaySelf { object: 1, prim: 2, light_object: 3, light_prim: 4 },
        };
        arena.write_shadow_ray(slot, &ray);
        let back = arena.read_shadow_ray(slot);
        assert_eq!(back.dd, 0.0);
        assert_eq!(back.self_prims, ray.self_prims);
        assert_eq!(back.d, ray.d);
    }

    #[test]
    fn disabled_features_allocate_nothing() {
        let mut arena =
            SoaArena::new(KernelFeatures::PATH_TRACING, SoaSizes::new(16, 16, 4)).unwrap();
        let state = arena.device_state();
        assert!(state.subsurface.albedo.is_null());
        assert!(state.path.optical_depth.is_null());
        assert!(state.volume_stack[0].object.is_null());
        // Always-present fields are backed regardless of the mask.
        assert!(!state.path.flag.is_null());
        assert!(!state.shadow_isect[0].t.is_null());
    }

    #[test]
    fn soa_field_tables_match_schema() {
        let expect = |group: &str| -> Vec<&'static str> {
            schema::group(group)
                .unwrap()
                .fields
                .iter()
                .filter(|f| {
                    if f.feature == Some(KernelFeatures::PATH_GUIDING) {
                        cfg!(feature = "path-guiding")
                    } else if f.feature == Some(KernelFeatures::SHADOW_LINKING) {
                        cfg!(feature = "shadow-linking")
                    } else {
                        true
                    }
                })
                .map(|f| f.name)
                .collect()
        };

        assert_eq!(PathSoa::field_names(), expect("path"));
        assert_eq!(RaySoa::field_names(), expect("ray"));
        assert_eq!(IsectSoa::field_names(), expect("isect"));
        assert_eq!(SubsurfaceSoa::field_names(), expect("subsurface"));
        assert_eq!(VolumeStackSoa::field_names(), expect("volume_stack"));
        assert_eq!(ShadowPathSoa::field_names(), expect("shadow_path"));
        assert_eq!(ShadowRaySoa::field_names(), expect("shadow_ray"));
        assert_eq!(ShadowIsectSoa::field_names(), expect("shadow_isect"));
        assert_eq!(
            ShadowVolumeStackSoa::field_names(),
            expect("shadow_volume_stack")
        );
        #[cfg(feature = "path-guiding")]
        assert_eq!(GuidingSoa::field_names(), expect("guiding"));
        #[cfg(feature = "shadow-linking")]
        assert_eq!(ShadowLinkSoa::field_names(), expect("shadow_link"));
    }

    #[test]
    fn volume_stack_copy_preserves_sentinel() {
        let mut arena = test_arena();
        let slot = arena.alloc_main_path().unwrap();
        let shadow = arena.alloc_shadow_path().unwrap();
        arena.init_main_path(slot, 0, 0, 0);
        arena.volume_stack_write(slot, 0, VolumeStackEntry { object: 3, shader: 11 });
        arena.volume_stack_write(slot, 1, VolumeStackEntry::SENTINEL);

        arena.copy_volume_stack_to_shadow(shadow, slot);

        assert_eq!(arena.shadow_volume_stack_read(shadow, 0).shader, 11);
        assert_eq!(
            arena.shadow_volume_stack_read(shadow, 1),
            VolumeStackEntry::SENTINEL
        );
    }

    #[test]
    fn init_queues_exactly_one_kernel_and_release_clears_it() {
        let mut arena = test_arena();
        let slot = arena.alloc_main_path().unwrap();
        arena.init_main_path(slot, 9, 1, 0xabcd);

        let queued = arena.path.queued_kernel(slot.index());
        assert_eq!(queued.count_ones(), 1);
        assert_eq!(
            arena.queue_counters().count(DeviceKernel::IntersectClosest),
            1
        );

        arena.release_main_path(slot);
        assert_eq!(arena.path.queued_kernel(slot.index()), 0);
        assert_eq!(
            arena.queue_counters().count(DeviceKernel::IntersectClosest),
            0
        );
    }

    #[test]
    fn shadow_catcher_split_claims_distinct_tagged_slot() {
        let mut arena = test_arena();
        let slot = arena.alloc_main_path().unwrap();
        arena.init_main_path(slot, 5, 0, 7);
        arena.volume_stack_write(slot, 0, VolumeStackEntry { object: 2, shader: 4 });

        let split = arena.shadow_catcher_split(slot).unwrap();
        assert_ne!(split, slot);
        assert_eq!(arena.path.render_pixel_index(split.index()), 5);
        assert_eq!(arena.volume_stack_read(split, 0).shader, 4);

        let split_flag = PathRayFlags::from_bits_truncate(arena.path.flag(split.index()));
        let parent_flag = PathRayFlags::from_bits_truncate(arena.path.flag(slot.index()));
        assert!(split_flag.contains(PathRayFlags::SHADOW_CATCHER_PASS));
        assert!(!parent_flag.contains(PathRayFlags::SHADOW_CATCHER_PASS));

        // Both halves are live and queued.
        assert_eq!(
            arena.queue_counters().count(DeviceKernel::IntersectClosest),
            2
        );
    }

    #[test]
    fn state_move_compacts_and_kills_the_source() {
        let mut arena = test_arena();
        let a = arena.alloc_main_path().unwrap();
        let b = arena.alloc_main_path().unwrap();
        arena.init_main_path(a, 1, 0, 0);
        arena.init_main_path(b, 2, 0, 0);
        arena.release_main_path(a);

        arena.state_move(a, b);
        assert_eq!(arena.path.render_pixel_index(a.index()), 2);
        assert_eq!(arena.path.queued_kernel(b.index()), 0);
        assert_eq!(
            DeviceKernel::from_queue_mask(arena.path.queued_kernel(a.index())),
            Some(DeviceKernel::IntersectClosest)
        );
    }

    #[test]
    fn init_shadow_path_copies_parent_bookkeeping() {
        let mut arena = test_arena();
        let slot = arena.alloc_main_path().unwrap();
        arena.init_main_path(slot, 21, 4, 99);
        arena.path.set_bounce(slot.index(), 2);

        let shadow = arena.alloc_shadow_path().unwrap();
        arena.init_shadow_path(shadow, slot, Vec3::splat(0.25));

        assert_eq!(arena.shadow_path.render_pixel_index(shadow.index()), 21);
        assert_eq!(arena.shadow_path.sample(shadow.index()), 4);
        assert_eq!(arena.shadow_path.bounce(shadow.index()), 2);
        assert_eq!(arena.shadow_path.num_hits(shadow.index()), 0);
        assert_eq!(
            DeviceKernel::from_queue_mask(arena.shadow_path.queued_kernel(shadow.index())),
            Some(DeviceKernel::IntersectShadow)
        );
    }

    #[test]
    fn shadow_isect_view_roundtrips() {
        let mut arena = test_arena();
        let shadow = arena.alloc_shadow_path().unwrap();
        let isect = Intersection {
            t: 3.5,
            u: 0.25,
            v: 0.5,
            prim: 12,
            object: 3,
            kind: wavefront_core::PrimitiveKind::TRIANGLE.bits(),
        };
        let mut view = arena.shadow_isect_slots(shadow);
        assert_eq!(view.capacity(), INTEGRATOR_SHADOW_ISECT_SIZE_GPU as u32);
        view.set(2, &isect);
        assert_eq!(view.get(2), isect);
    }
}
