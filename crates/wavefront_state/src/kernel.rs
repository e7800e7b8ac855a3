//! Dispatch stages of the wavefront integrator.
//!
//! Each stage is one device kernel. A live path is always waiting on exactly
//! one stage, recorded as a one-hot bit in its `queued_kernel` word; a zero
//! word marks a dead slot that the next compaction pass may reclaim.

/// One kernel of the wavefront pipeline.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKernel {
    InitFromCamera = 0,
    InitFromBake = 1,
    IntersectClosest = 2,
    IntersectShadow = 3,
    IntersectSubsurface = 4,
    IntersectVolumeStack = 5,
    /// Shadow-linking only: traces the dedicated light ray.
    IntersectDedicatedLight = 6,
    ShadeBackground = 7,
    ShadeLight = 8,
    ShadeSurface = 9,
    /// Surfaces whose shader runs raytrace nodes.
    ShadeSurfaceRaytrace = 10,
    /// Surfaces shaded through manifold next-event estimation.
    ShadeSurfaceMnee = 11,
    ShadeVolume = 12,
    ShadeShadow = 13,
    /// Shadow-linking only: shades the dedicated light hit.
    ShadeDedicatedLight = 14,
    /// All stages fused into one kernel, for devices that prefer it.
    Megakernel = 15,
}

/// Number of dispatch stages; sizes every per-kernel counter array.
pub const DEVICE_KERNEL_COUNT: usize = 16;

impl DeviceKernel {
    /// Every kernel in dispatch order.
    pub const ALL: [DeviceKernel; DEVICE_KERNEL_COUNT] = [
        DeviceKernel::InitFromCamera,
        DeviceKernel::InitFromBake,
        DeviceKernel::IntersectClosest,
        DeviceKernel::IntersectShadow,
        DeviceKernel::IntersectSubsurface,
        DeviceKernel::IntersectVolumeStack,
        DeviceKernel::IntersectDedicatedLight,
        DeviceKernel::ShadeBackground,
        DeviceKernel::ShadeLight,
        DeviceKernel::ShadeSurface,
        DeviceKernel::ShadeSurfaceRaytrace,
        DeviceKernel::ShadeSurfaceMnee,
        DeviceKernel::ShadeVolume,
        DeviceKernel::ShadeShadow,
        DeviceKernel::ShadeDedicatedLight,
        DeviceKernel::Megakernel,
    ];

    /// The one-hot `queued_kernel` word for a path waiting on this stage.
    #[inline]
    pub const fn queue_mask(self) -> u16 {
        1 << (self as u32)
    }

    /// Recovers the stage from a one-hot `queued_kernel` word. Returns `None`
    /// for the zero word (dead slot) or a corrupted multi-bit word.
    #[inline]
    pub fn from_queue_mask(mask: u16) -> Option<DeviceKernel> {
        if mask.count_ones() != 1 {
            return None;
        }
        Some(Self::ALL[mask.trailing_zeros() as usize])
    }

    /// Whether paths queued for this stage are sorted by shader id before
    /// dispatch, for execution coherence.
    #[inline]
    pub fn sorts_by_shader(self) -> bool {
        matches!(
            self,
            DeviceKernel::ShadeSurface
                | DeviceKernel::ShadeSurfaceRaytrace
                | DeviceKernel::ShadeSurfaceMnee
                | DeviceKernel::ShadeVolume
        )
    }

    /// Whether this stage operates on shadow paths rather than main paths.
    #[inline]
    pub fn is_shadow(self) -> bool {
        matches!(
            self,
            DeviceKernel::IntersectShadow
                | DeviceKernel::ShadeShadow
                | DeviceKernel::IntersectDedicatedLight
                | DeviceKernel::ShadeDedicatedLight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_are_one_hot_and_roundtrip() {
        for kernel in DeviceKernel::ALL {
            let mask = kernel.queue_mask();
            assert_eq!(mask.count_ones(), 1);
            assert_eq!(DeviceKernel::from_queue_mask(mask), Some(kernel));
        }
        assert_eq!(DeviceKernel::from_queue_mask(0), None);
        assert_eq!(
            DeviceKernel::from_queue_mask(
                DeviceKernel::ShadeSurface.queue_mask()
                    | DeviceKernel::ShadeShadow.queue_mask()
            ),
            None
        );
    }

    #[test]
    fn all_is_in_discriminant_order() {
        for (i, kernel) in DeviceKernel::ALL.iter().enumerate() {
            assert_eq!(*kernel as usize, i);
        }
    }
}
