//! The transparent-shadow any-hit filter.
//!
//! BVH backends call this for every candidate intersection of a shadow ray.
//! The filter decides, per candidate, whether the ray is fully blocked (stop
//! traversal), the candidate is irrelevant (continue unchanged), or the
//! candidate is a transparent surface to record for later shading — while
//! keeping at most the N closest such hits in the shadow path's bounded
//! record array and a running throughput for the hair shortcut.
//!
//! Recording never fails: `num_recorded_hits` keeps counting past the array
//! capacity, and the intersect-shadow kernel re-enters traversal for another
//! pass when it sees the overflow. Nothing here allocates or errors.

use glam::Vec3;

use wavefront_core::types::{
    Intersection, RaySelf, ShaderFlags, VisibilityFlags, CURVE_SHADOW_TRANSPARENCY_CUTOFF,
};
use wavefront_core::KernelFeatures;
use wavefront_device::KernelGlobalsCpu;
use wavefront_state::ShadowIsectArray;

/// Verdict of the filter for one candidate hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Keep traversing; the candidate was recorded, skipped, or attenuated.
    Continue,
    /// The ray is fully blocked; traversal may stop.
    Blocked,
}

impl FilterResult {
    /// Whether traversal should keep going, the boolean anyhit backends
    /// expect.
    #[inline]
    pub fn continues(self) -> bool {
        self == FilterResult::Continue
    }
}

/// Per-traversal accumulator for one shadow ray. Lives in registers (or the
/// backend's payload slots) for the duration of a single BVH walk; never
/// persisted.
#[derive(Debug, Clone, Copy)]
pub struct ShadowAllPayload {
    /// Primitives excluded as self-intersections, from the ray.
    pub self_prims: RaySelf,
    /// Visibility word the ray traces with.
    pub visibility: VisibilityFlags,
    /// Transparent surfaces allowed before the ray counts as blocked.
    pub max_transparent_hits: u32,
    /// Non-excluded transparent surfaces seen so far.
    pub num_transparent_hits: u32,
    /// Record slots available in the shadow path's intersection array.
    pub max_record_hits: u32,
    /// Hits recorded so far; may exceed `max_record_hits`, which signals the
    /// caller to re-enter traversal after shading the recorded batch.
    pub num_recorded_hits: u32,
    /// Slot the next eviction overwrites; valid once the array is full.
    pub record_index: u32,
    /// Distance of the most distant recorded hit; valid once full.
    pub max_record_t: f32,
    /// Running transparency product from the curve shortcut.
    pub throughput: Vec3,
}

impl ShadowAllPayload {
    /// A fresh payload for one traversal of `ray`.
    pub fn new(
        self_prims: RaySelf,
        visibility: VisibilityFlags,
        max_transparent_hits: u32,
        max_record_hits: u32,
    ) -> ShadowAllPayload {
        ShadowAllPayload {
            self_prims,
            visibility,
            max_transparent_hits,
            num_transparent_hits: 0,
            max_record_hits,
            num_recorded_hits: 0,
            record_index: 0,
            max_record_t: 0.0,
            throughput: Vec3::ONE,
        }
    }
}

/// Whether the candidate is the ray's own origin primitive or the sampled
/// light, neither of which may occlude.
#[inline]
pub fn intersection_skip_self_shadow(self_prims: &RaySelf, object: i32, prim: i32) -> bool {
    (self_prims.object == object && self_prims.prim == prim)
        || (self_prims.light_object == object && self_prims.light_prim == prim)
}

#[inline]
fn average(v: Vec3) -> f32 {
    (v.x + v.y + v.z) * (1.0 / 3.0)
}

/// Scans the record array for the most distant stored hit. Strict `>` keeps
/// the first-encountered maximum on ties; eviction order is part of the
/// observable behavior.
fn find_most_distant<A: ShadowIsectArray>(isects: &A, count: u32) -> (u32, f32) {
    let mut max_index = 0;
    let mut max_t = isects.get(0).t;
    for index in 1..count {
        let t = isects.get(index).t;
        if t > max_t {
            max_t = t;
            max_index = index;
        }
    }
    (max_index, max_t)
}

/// Processes one candidate hit of a shadow ray.
///
/// Returns [`FilterResult::Blocked`] with zeroed throughput as soon as the
/// ray is provably occluded: an opaque surface, the transparent-hit budget
/// exceeded, or the curve transparency product under the cutoff. Otherwise
/// records or skips the candidate and asks traversal to continue.
pub fn shadow_all_filter<A: ShadowIsectArray>(
    globals: &KernelGlobalsCpu,
    payload: &mut ShadowAllPayload,
    isects: &mut A,
    candidate: &Intersection,
) -> FilterResult {
    debug_assert!(payload.max_record_hits <= isects.capacity());

    if intersection_skip_self_shadow(&payload.self_prims, candidate.object, candidate.prim) {
        return FilterResult::Continue;
    }
    if !globals
        .scene
        .object_visibility(candidate.object)
        .intersects(payload.visibility)
    {
        return FilterResult::Continue;
    }

    let features = globals.data.features();

    // Without transparent shadows in the scene, any surviving hit occludes.
    if !features.contains(KernelFeatures::TRANSPARENT) {
        payload.throughput = Vec3::ZERO;
        return FilterResult::Blocked;
    }

    let shader_flags = globals.scene.intersection_shader_flags(candidate);
    if !shader_flags.contains(ShaderFlags::HAS_TRANSPARENT_SHADOW) {
        payload.throughput = Vec3::ZERO;
        return FilterResult::Blocked;
    }

    if candidate.is_curve() {
        // Hair is attenuated straight from its baked transparency instead of
        // recording every strand crossing.
        let transparency = globals.scene.curve_shadow_transparency(candidate);
        payload.throughput *= transparency;
        if average(payload.throughput) < CURVE_SHADOW_TRANSPARENCY_CUTOFF {
            payload.throughput = Vec3::ZERO;
            return FilterResult::Blocked;
        }
        return FilterResult::Continue;
    }

    // Spatial splits can hand the same primitive to traversal twice.
    let stored = payload.num_recorded_hits.min(payload.max_record_hits);
    for index in 0..stored {
        let recorded = isects.get(index);
        if recorded.object == candidate.object && recorded.prim == candidate.prim {
            return FilterResult::Continue;
        }
    }

    // Volume-only boundaries are counted against the transparency budget at
    // shading time, once the stack crossing is resolved.
    if !shader_flags.contains(ShaderFlags::HAS_ONLY_VOLUME) {
        payload.num_transparent_hits += 1;
        if payload.num_transparent_hits > payload.max_transparent_hits {
            payload.throughput = Vec3::ZERO;
            return FilterResult::Blocked;
        }
    }

    let capacity = payload.max_record_hits;
    let full = payload.num_recorded_hits >= capacity;
    payload.num_recorded_hits += 1;

    if full {
        if candidate.t >= payload.max_record_t {
            // Not among the N closest; the overflow count alone signals the
            // re-entry.
            return FilterResult::Continue;
        }
        isects.set(payload.record_index, candidate);
        let (index, t) = find_most_distant(isects, capacity);
        payload.record_index = index;
        payload.max_record_t = t;
    } else {
        let index = payload.num_recorded_hits - 1;
        isects.set(index, candidate);
        if payload.num_recorded_hits == capacity {
            let (index, t) = find_most_distant(isects, capacity);
            payload.record_index = index;
            payload.max_record_t = t;
        }
    }

    FilterResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use wavefront_core::types::PrimitiveKind;
    use wavefront_device::{KernelData, SceneData};

    const OPAQUE_SHADER: u32 = 0;
    const TRANSPARENT_SHADER: u32 = 1;
    const VOLUME_ONLY_SHADER: u32 = 2;
    const CURVE_SHADER: u32 = 3;

    const VISIBLE_OBJECT: i32 = 0;
    const HIDDEN_OBJECT: i32 = 1;

    /// Prim ids map to shaders round-robin so tests can pick a shader by
    /// choosing `prim % 4`; curve transparency is baked per prim.
    fn scene(num_prims: usize, curve_transparency: f32) -> SceneData {
        SceneData {
            shader_flags: vec![
                0,
                ShaderFlags::HAS_TRANSPARENT_SHADOW.bits(),
                (ShaderFlags::HAS_TRANSPARENT_SHADOW
                    | ShaderFlags::HAS_VOLUME
                    | ShaderFlags::HAS_ONLY_VOLUME)
                    .bits(),
                ShaderFlags::HAS_TRANSPARENT_SHADOW.bits(),
            ],
            object_flags: vec![0, 0],
            object_visibility: vec![VisibilityFlags::ALL.bits(), 0],
            prim_shader: (0..num_prims as u32).map(|p| p % 4).collect(),
            curve_shadow_transparency: vec![curve_transparency; num_prims],
        }
    }

    fn kernel_data(features: KernelFeatures, max_transparent_hits: u32) -> KernelData {
        KernelData {
            kernel_features: features.bits(),
            max_shaders: 4,
            volume_stack_size: 4,
            max_transparent_hits,
        }
    }

    fn hit(t: f32, prim: i32) -> Intersection {
        Intersection {
            t,
            u: 0.0,
            v: 0.0,
            prim,
            object: VISIBLE_OBJECT,
            kind: PrimitiveKind::TRIANGLE.bits(),
        }
    }

    fn curve_hit(t: f32, prim: i32) -> Intersection {
        Intersection {
            kind: PrimitiveKind::CURVE_RIBBON.bits(),
            ..hit(t, prim)
        }
    }

    /// Plain vector-backed record array.
    struct Records(Vec<Intersection>);

    impl Records {
        fn new(capacity: usize) -> Records {
            Records(vec![Intersection::NONE; capacity])
        }
    }

    impl ShadowIsectArray for Records {
        fn capacity(&self) -> u32 {
            self.0.len() as u32
        }
        fn get(&self, index: u32) -> Intersection {
            self.0[index as usize]
        }
        fn set(&mut self, index: u32, isect: &Intersection) {
            self.0[index as usize] = *isect;
        }
    }

    /// Record array that fails the test if the filter touches it at all.
    struct UntouchableRecords;

    impl ShadowIsectArray for UntouchableRecords {
        fn capacity(&self) -> u32 {
            4
        }
        fn get(&self, _index: u32) -> Intersection {
            panic!("opaque-scene filter read the shadow intersection array");
        }
        fn set(&mut self, _index: u32, _isect: &Intersection) {
            panic!("opaque-scene filter wrote the shadow intersection array");
        }
    }

    fn payload(max_transparent_hits: u32, max_record_hits: u32) -> ShadowAllPayload {
        ShadowAllPayload::new(
            RaySelf::NONE,
            VisibilityFlags::SHADOW,
            max_transparent_hits,
            max_record_hits,
        )
    }

    #[test]
    fn opaque_scene_blocks_on_first_hit_without_touching_records() {
        // Path tracing only: no transparent shadows anywhere.
        let data = kernel_data(KernelFeatures::PATH_TRACING, 8);
        let scene = scene(16, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut payload = payload(8, 4);
        let mut records = UntouchableRecords;

        // Transparent or opaque shader alike, the first surviving hit blocks.
        for prim in [TRANSPARENT_SHADER as i32, OPAQUE_SHADER as i32] {
            let result =
                shadow_all_filter(&globals, &mut payload, &mut records, &hit(1.0, prim));
            assert_eq!(result, FilterResult::Blocked);
            assert_eq!(payload.throughput, Vec3::ZERO);
        }
        assert_eq!(payload.num_recorded_hits, 0);
    }

    #[test]
    fn opaque_shader_blocks_in_transparent_scene() {
        let data = kernel_data(KernelFeatures::TRANSPARENT, 8);
        let scene = scene(16, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut payload = payload(8, 4);
        let mut records = Records::new(4);

        let result = shadow_all_filter(
            &globals,
            &mut payload,
            &mut records,
            &hit(1.0, OPAQUE_SHADER as i32),
        );
        assert_eq!(result, FilterResult::Blocked);
        assert_eq!(payload.throughput, Vec3::ZERO);
    }

    #[test]
    fn exclusions_pass_through_untouched() {
        let data = kernel_data(KernelFeatures::TRANSPARENT, 8);
        let scene = scene(16, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut records = Records::new(4);

        // Self primitive.
        let mut p = payload(8, 4);
        p.self_prims = RaySelf { object: VISIBLE_OBJECT, prim: 1, ..RaySelf::NONE };
        assert_eq!(
            shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0, 1)),
            FilterResult::Continue
        );
        assert_eq!(p.num_transparent_hits, 0);
        assert_eq!(p.num_recorded_hits, 0);

        // The sampled light itself.
        let mut p = payload(8, 4);
        p.self_prims =
            RaySelf { light_object: VISIBLE_OBJECT, light_prim: 5, ..RaySelf::NONE };
        assert_eq!(
            shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0, 5)),
            FilterResult::Continue
        );
        assert_eq!(p.num_recorded_hits, 0);

        // Invisible object.
        let mut p = payload(8, 4);
        let mut invisible = hit(1.0, 1);
        invisible.object = HIDDEN_OBJECT;
        assert_eq!(
            shadow_all_filter(&globals, &mut p, &mut records, &invisible),
            FilterResult::Continue
        );
        assert_eq!(p.num_recorded_hits, 0);
    }

    #[test]
    fn three_transparent_hits_with_budget_of_two() {
        // The worked example: three transparent triangles at t = 1, 2, 3,
        // two record slots, two transparent hits allowed.
        let data = kernel_data(KernelFeatures::TRANSPARENT, 2);
        let scene = scene(16, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(2, 2);
        let mut records = Records::new(2);

        assert_eq!(
            shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0, 1)),
            FilterResult::Continue
        );
        assert_eq!(
            shadow_all_filter(&globals, &mut p, &mut records, &hit(2.0, 5)),
            FilterResult::Continue
        );
        assert_eq!(p.num_recorded_hits, 2);

        let result = shadow_all_filter(&globals, &mut p, &mut records, &hit(3.0, 9));
        assert_eq!(result, FilterResult::Blocked);
        assert_eq!(p.throughput, Vec3::ZERO);
        assert_eq!(p.num_transparent_hits, 3);

        // The two closest stay recorded.
        let mut ts = [records.get(0).t, records.get(1).t];
        ts.sort_by(f32::total_cmp);
        assert_eq!(ts, [1.0, 2.0]);
    }

    #[test]
    fn keeps_the_n_closest_hits() {
        let data = kernel_data(KernelFeatures::TRANSPARENT, 100);
        let scene = scene(64, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(100, 2);
        let mut records = Records::new(2);

        for (i, t) in [3.0f32, 1.0, 2.0].iter().enumerate() {
            let result = shadow_all_filter(
                &globals,
                &mut p,
                &mut records,
                &hit(*t, (i as i32) * 4 + 1),
            );
            assert_eq!(result, FilterResult::Continue);
        }

        assert_eq!(p.num_recorded_hits, 3);
        let mut ts = [records.get(0).t, records.get(1).t];
        ts.sort_by(f32::total_cmp);
        assert_eq!(ts, [1.0, 2.0]);
    }

    #[test]
    fn eviction_tie_break_takes_first_most_distant() {
        let data = kernel_data(KernelFeatures::TRANSPARENT, 100);
        let scene = scene(64, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(100, 2);
        let mut records = Records::new(2);

        shadow_all_filter(&globals, &mut p, &mut records, &hit(5.0, 1));
        shadow_all_filter(&globals, &mut p, &mut records, &hit(5.0, 5));
        // Both slots hold t = 5; the strict > scan keeps the first maximum,
        // so slot 0 is evicted.
        shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0, 9));

        assert_eq!(records.get(0).t, 1.0);
        assert_eq!(records.get(1).t, 5.0);
    }

    #[test]
    fn recorded_set_is_n_closest_under_random_order() {
        let data = kernel_data(KernelFeatures::TRANSPARENT, 1000);
        let scene = scene(512, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(1000, 4);
        let mut records = Records::new(4);

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut all_ts: Vec<f32> = Vec::new();
        let mut recorded_before = 0;
        for i in 0..100 {
            let t: f32 = rng.gen_range(0.01..100.0);
            // Transparent, non-volume shaders only; unique prim per hit.
            let prim = (i * 4 + 1) as i32 % 512;
            let result = shadow_all_filter(&globals, &mut p, &mut records, &hit(t, prim));
            assert_eq!(result, FilterResult::Continue);
            all_ts.push(t);

            // Monotonic recording count.
            assert!(p.num_recorded_hits > recorded_before);
            recorded_before = p.num_recorded_hits;
        }

        all_ts.sort_by(f32::total_cmp);
        let mut stored: Vec<f32> = (0..4).map(|i| records.get(i).t).collect();
        stored.sort_by(f32::total_cmp);
        assert_eq!(&stored[..], &all_ts[..4]);
        assert_eq!(p.num_recorded_hits, 100);
    }

    #[test]
    fn duplicate_primitive_is_recorded_once() {
        let data = kernel_data(KernelFeatures::TRANSPARENT, 8);
        let scene = scene(16, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(8, 4);
        let mut records = Records::new(4);

        shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0, 1));
        // A spatial split revisits the same (object, prim).
        let result = shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0, 1));
        assert_eq!(result, FilterResult::Continue);
        assert_eq!(p.num_recorded_hits, 1);
        assert_eq!(p.num_transparent_hits, 1);
    }

    #[test]
    fn volume_only_shader_is_recorded_but_not_counted() {
        let data = kernel_data(
            KernelFeatures::TRANSPARENT | KernelFeatures::NODE_VOLUME,
            1,
        );
        let scene = scene(16, 0.5);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(1, 4);
        let mut records = Records::new(4);

        // Two volume boundaries do not exhaust a budget of one.
        for prim in [2, 6] {
            let result =
                shadow_all_filter(&globals, &mut p, &mut records, &hit(1.0 + prim as f32, prim));
            assert_eq!(result, FilterResult::Continue);
        }
        assert_eq!(p.num_transparent_hits, 0);
        assert_eq!(p.num_recorded_hits, 2);
    }

    #[test]
    fn curve_transparency_multiplies_until_cutoff() {
        let data = kernel_data(
            KernelFeatures::TRANSPARENT | KernelFeatures::HAIR,
            100,
        );
        let scene = scene(16, 0.05);
        let globals = KernelGlobalsCpu::new(&data, &scene);
        let mut p = payload(100, 4);
        let mut records = Records::new(4);

        // 0.05, then 0.0025: attenuated but unblocked, nothing recorded.
        for (i, expected) in [(0, 0.05f32), (1, 0.0025f32)] {
            let result = shadow_all_filter(
                &globals,
                &mut p,
                &mut records,
                &curve_hit(1.0 + i as f32, (3 + i * 4) as i32),
            );
            assert_eq!(result, FilterResult::Continue);
            assert!((p.throughput.x - expected).abs() < 1e-7);
        }
        assert_eq!(p.num_recorded_hits, 0);

        // 0.000125 drops under the cutoff: blocked, forced to zero.
        let result = shadow_all_filter(&globals, &mut p, &mut records, &curve_hit(3.0, 11));
        assert_eq!(result, FilterResult::Blocked);
        assert_eq!(p.throughput, Vec3::ZERO);
    }
}
