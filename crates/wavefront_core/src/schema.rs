//! The state-field schema.
//!
//! Every field of in-flight path state is described exactly once, here, as
//! const data: which group it belongs to, its storage type, and the feature
//! flag that owns it. The physical layouts in `wavefront_state` are generated
//! from the same inventory (via the field-table macro there), the Metal
//! backend consumes this table to name its specialization constants, and the
//! tests cross-check the two so the macro table and this schema cannot drift
//! apart.
//!
//! Array groups carry two capacities because the CPU and GPU targets size
//! their shadow-intersection arrays very differently: the CPU can afford 1024
//! recorded transparent hits per ray, a GPU pays the footprint per path slot
//! and records 4.
//!
//! The schema always describes the full field universe. Fields owned by a
//! build-gated feature (path guiding, shadow linking) are present here even
//! when the corresponding cargo feature is off; the layouts compile them out
//! and the cross-check tests filter on the owning flag.

use crate::features::KernelFeatures;
use crate::types::{
    INTEGRATOR_SHADOW_ISECT_SIZE_CPU, INTEGRATOR_SHADOW_ISECT_SIZE_GPU, MAX_VOLUME_STACK_SIZE,
};

/// Storage type of a state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U16,
    U32,
    I32,
    F32,
    /// Three packed floats.
    PackedVec3,
    /// Spectral throughput, stored packed.
    Spectrum,
    /// Pointer-sized opaque id owned by an external library.
    OpaqueHandle,
}

impl FieldType {
    /// Size of the storage type in bytes.
    pub const fn size(self) -> usize {
        match self {
            FieldType::U16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::PackedVec3 | FieldType::Spectrum => 12,
            FieldType::OpaqueHandle => 8,
        }
    }
}

/// One state field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDesc {
    pub name: &'static str,
    pub ty: FieldType,
    /// Owning feature; `None` means the field exists in every kernel build.
    pub feature: Option<KernelFeatures>,
}

/// Whether a group is one record per path or a fixed-capacity array of
/// records per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Single,
    Array {
        cpu_capacity: usize,
        gpu_capacity: usize,
    },
}

/// One field group of the integrator state.
#[derive(Debug, Clone, Copy)]
pub struct GroupDesc {
    pub name: &'static str,
    pub kind: GroupKind,
    pub fields: &'static [FieldDesc],
}

impl GroupDesc {
    /// Bytes one path slot contributes to this group on the given target,
    /// counting only fields enabled under `features`.
    pub fn bytes_per_slot(&self, features: KernelFeatures, gpu: bool) -> usize {
        let per_record: usize = self
            .fields
            .iter()
            .filter(|f| f.feature.map_or(true, |owner| features.contains(owner)))
            .map(|f| f.ty.size())
            .sum();
        match self.kind {
            GroupKind::Single => per_record,
            GroupKind::Array { cpu_capacity, gpu_capacity } => {
                per_record * if gpu { gpu_capacity } else { cpu_capacity }
            }
        }
    }
}

const fn field(name: &'static str, ty: FieldType) -> FieldDesc {
    FieldDesc { name, ty, feature: None }
}

const fn feature_field(
    name: &'static str,
    ty: FieldType,
    feature: KernelFeatures,
) -> FieldDesc {
    FieldDesc { name, ty, feature: Some(feature) }
}

const PATH_FIELDS: &[FieldDesc] = &[
    field("render_pixel_index", FieldType::U32),
    field("rng_pixel", FieldType::U32),
    field("rng_offset", FieldType::U32),
    field("sample", FieldType::U32),
    field("bounce", FieldType::U16),
    field("diffuse_bounce", FieldType::U16),
    field("glossy_bounce", FieldType::U16),
    field("transmission_bounce", FieldType::U16),
    field("transparent_bounce", FieldType::U16),
    field("volume_bounce", FieldType::U16),
    field("volume_bounds_bounce", FieldType::U16),
    field("queued_kernel", FieldType::U16),
    field("flag", FieldType::U32),
    field("mis_ray_pdf", FieldType::F32),
    field("min_ray_pdf", FieldType::F32),
    field("continuation_probability", FieldType::F32),
    field("throughput", FieldType::Spectrum),
    field("mis_origin_n", FieldType::PackedVec3),
    field("mis_ray_object", FieldType::I32),
    feature_field("optical_depth", FieldType::F32, KernelFeatures::DENOISING),
    feature_field("unguided_throughput", FieldType::F32, KernelFeatures::PATH_GUIDING),
    feature_field("pass_diffuse_weight", FieldType::F32, KernelFeatures::LIGHT_PASSES),
    feature_field("pass_glossy_weight", FieldType::F32, KernelFeatures::LIGHT_PASSES),
];

const RAY_FIELDS: &[FieldDesc] = &[
    field("p", FieldType::PackedVec3),
    field("d", FieldType::PackedVec3),
    field("tmin", FieldType::F32),
    field("tmax", FieldType::F32),
    field("time", FieldType::F32),
    field("dp", FieldType::F32),
    field("dd", FieldType::F32),
    field("previous_dt", FieldType::F32),
];

const ISECT_FIELDS: &[FieldDesc] = &[
    field("t", FieldType::F32),
    field("u", FieldType::F32),
    field("v", FieldType::F32),
    field("prim", FieldType::I32),
    field("object", FieldType::I32),
    field("kind", FieldType::U32),
];

const SUBSURFACE_FIELDS: &[FieldDesc] = &[feature_field(
    "albedo",
    FieldType::Spectrum,
    KernelFeatures::SUBSURFACE,
)];

const VOLUME_STACK_FIELDS: &[FieldDesc] = &[
    feature_field("object", FieldType::I32, KernelFeatures::NODE_VOLUME),
    feature_field("shader", FieldType::I32, KernelFeatures::NODE_VOLUME),
];

const GUIDING_FIELDS: &[FieldDesc] = &[
    feature_field("path_segment", FieldType::OpaqueHandle, KernelFeatures::PATH_GUIDING),
    feature_field("use_surface_guiding", FieldType::U32, KernelFeatures::PATH_GUIDING),
    feature_field("use_volume_guiding", FieldType::U32, KernelFeatures::PATH_GUIDING),
    feature_field("sample_surface_guiding_rand", FieldType::F32, KernelFeatures::PATH_GUIDING),
    feature_field("sample_volume_guiding_rand", FieldType::F32, KernelFeatures::PATH_GUIDING),
];

const SHADOW_LINK_FIELDS: &[FieldDesc] = &[
    feature_field("dedicated_light_weight", FieldType::F32, KernelFeatures::SHADOW_LINKING),
    feature_field("last_throughput", FieldType::Spectrum, KernelFeatures::SHADOW_LINKING),
];

const SHADOW_PATH_FIELDS: &[FieldDesc] = &[
    field("render_pixel_index", FieldType::U32),
    field("rng_pixel", FieldType::U32),
    field("rng_offset", FieldType::U32),
    field("sample", FieldType::U32),
    field("flag", FieldType::U32),
    field("queued_kernel", FieldType::U16),
    field("bounce", FieldType::U16),
    field("diffuse_bounce", FieldType::U16),
    field("glossy_bounce", FieldType::U16),
    field("transmission_bounce", FieldType::U16),
    field("transparent_bounce", FieldType::U16),
    field("volume_bounds_bounce", FieldType::U16),
    field("num_hits", FieldType::U32),
    field("throughput", FieldType::Spectrum),
    feature_field("unshadowed_throughput", FieldType::Spectrum, KernelFeatures::AO_ADDITIVE),
    feature_field("unlit_throughput", FieldType::Spectrum, KernelFeatures::SHADOW_CATCHER),
    feature_field("pass_diffuse_weight", FieldType::F32, KernelFeatures::LIGHT_PASSES),
    feature_field("pass_glossy_weight", FieldType::F32, KernelFeatures::LIGHT_PASSES),
    feature_field("lightgroup", FieldType::U32, KernelFeatures::LIGHT_PASSES),
    feature_field("guiding_mis_weight", FieldType::F32, KernelFeatures::PATH_GUIDING),
    feature_field("path_segment", FieldType::OpaqueHandle, KernelFeatures::PATH_GUIDING),
];

const SHADOW_RAY_FIELDS: &[FieldDesc] = &[
    field("p", FieldType::PackedVec3),
    field("d", FieldType::PackedVec3),
    field("tmin", FieldType::F32),
    field("tmax", FieldType::F32),
    field("time", FieldType::F32),
    field("dp", FieldType::F32),
    field("self_object", FieldType::I32),
    field("self_prim", FieldType::I32),
    field("self_light_object", FieldType::I32),
    field("self_light_prim", FieldType::I32),
];

const SHADOW_ISECT_FIELDS: &[FieldDesc] = ISECT_FIELDS;

/// Field groups of the main path state, in declaration order.
pub const MAIN_GROUPS: &[GroupDesc] = &[
    GroupDesc { name: "path", kind: GroupKind::Single, fields: PATH_FIELDS },
    GroupDesc { name: "ray", kind: GroupKind::Single, fields: RAY_FIELDS },
    GroupDesc { name: "isect", kind: GroupKind::Single, fields: ISECT_FIELDS },
    GroupDesc { name: "subsurface", kind: GroupKind::Single, fields: SUBSURFACE_FIELDS },
    GroupDesc {
        name: "volume_stack",
        kind: GroupKind::Array {
            cpu_capacity: MAX_VOLUME_STACK_SIZE,
            gpu_capacity: MAX_VOLUME_STACK_SIZE,
        },
        fields: VOLUME_STACK_FIELDS,
    },
    GroupDesc { name: "guiding", kind: GroupKind::Single, fields: GUIDING_FIELDS },
    GroupDesc { name: "shadow_link", kind: GroupKind::Single, fields: SHADOW_LINK_FIELDS },
];

/// Field groups of the shadow path state, in declaration order.
pub const SHADOW_GROUPS: &[GroupDesc] = &[
    GroupDesc { name: "shadow_path", kind: GroupKind::Single, fields: SHADOW_PATH_FIELDS },
    GroupDesc { name: "shadow_ray", kind: GroupKind::Single, fields: SHADOW_RAY_FIELDS },
    GroupDesc {
        name: "shadow_isect",
        kind: GroupKind::Array {
            cpu_capacity: INTEGRATOR_SHADOW_ISECT_SIZE_CPU,
            gpu_capacity: INTEGRATOR_SHADOW_ISECT_SIZE_GPU,
        },
        fields: SHADOW_ISECT_FIELDS,
    },
    GroupDesc {
        name: "shadow_volume_stack",
        kind: GroupKind::Array {
            cpu_capacity: MAX_VOLUME_STACK_SIZE,
            gpu_capacity: MAX_VOLUME_STACK_SIZE,
        },
        fields: VOLUME_STACK_FIELDS,
    },
];

/// Looks up a group by name across both state sets.
pub fn group(name: &str) -> Option<&'static GroupDesc> {
    MAIN_GROUPS
        .iter()
        .chain(SHADOW_GROUPS.iter())
        .find(|g| g.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_unique_and_nonempty() {
        let mut seen = std::collections::HashSet::new();
        for g in MAIN_GROUPS.iter().chain(SHADOW_GROUPS.iter()) {
            assert!(seen.insert(g.name), "duplicate group {}", g.name);
            assert!(!g.fields.is_empty());
        }
    }

    #[test]
    fn field_names_unique_within_group() {
        for g in MAIN_GROUPS.iter().chain(SHADOW_GROUPS.iter()) {
            let mut seen = std::collections::HashSet::new();
            for f in g.fields {
                assert!(seen.insert(f.name), "{}.{} listed twice", g.name, f.name);
            }
        }
    }

    #[test]
    fn shadow_isect_capacities_differ_per_target() {
        let g = group("shadow_isect").unwrap();
        assert_eq!(
            g.kind,
            GroupKind::Array { cpu_capacity: 1024, gpu_capacity: 4 }
        );
    }

    #[test]
    fn disabled_feature_contributes_no_bytes() {
        let g = group("subsurface").unwrap();
        assert_eq!(g.bytes_per_slot(KernelFeatures::PATH_TRACING, true), 0);
        assert_ne!(
            g.bytes_per_slot(KernelFeatures::SUBSURFACE, true),
            0
        );
    }

    #[test]
    fn volume_stack_bytes_scale_with_capacity() {
        let g = group("volume_stack").unwrap();
        let per_entry = 8;
        assert_eq!(
            g.bytes_per_slot(KernelFeatures::NODE_VOLUME, false),
            per_entry * crate::types::MAX_VOLUME_STACK_SIZE
        );
    }
}
