//! Lock-free bookkeeping shared by all paths.
//!
//! The only synchronization primitive in the whole state model is the atomic
//! fetch-and-increment used to hand out path slots. Slots, once allocated,
//! are exclusively owned by the allocating path until a compaction pass
//! recycles them, so nothing else needs locking. The counter words are plain
//! 32-bit integers in the device-visible layout; on the host they are driven
//! through [`core::sync::atomic`] types of identical layout, the same
//! CPU-fallback discipline the device atomics use.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::kernel::{DeviceKernel, DEVICE_KERNEL_COUNT};

/// Hands out disjoint slot indices from a fixed-capacity range.
///
/// Allocation past capacity fails: the state arrays are sized once per
/// render, and running out is a hard resource limit the dispatcher must plan
/// for, not a condition this layer can recover from. The counter saturates
/// past the end (the transient overshoot from concurrent failed allocations
/// is harmless because no slot index is handed out for it) and is rewound by
/// the dispatcher through [`SlotAllocator::reset`] after compaction.
#[derive(Debug)]
pub struct SlotAllocator {
    next: AtomicU32,
    capacity: u32,
}

impl SlotAllocator {
    pub fn new(capacity: u32) -> SlotAllocator {
        SlotAllocator {
            next: AtomicU32::new(0),
            capacity,
        }
    }

    /// Claims the next free slot. Returns `None` once the range is exhausted.
    #[inline]
    pub fn alloc(&self) -> Option<u32> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.capacity).then_some(index)
    }

    /// Number of slots handed out so far.
    #[inline]
    pub fn in_use(&self) -> u32 {
        self.next.load(Ordering::Relaxed).min(self.capacity)
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Rewinds the counter after compaction has packed the live range down to
    /// `in_use` slots. Must not run concurrently with `alloc`.
    pub fn reset(&self, in_use: u32) {
        debug_assert!(in_use <= self.capacity);
        self.next.store(in_use, Ordering::Relaxed);
    }

    /// The raw counter word as it appears in the device-visible layout.
    pub fn counter_ptr(&self) -> *mut i32 {
        self.next.as_ptr() as *mut i32
    }
}

/// Per-stage queued-path counters, in the exact layout device kernels see.
///
/// Kernels increment these with device atomics when queueing a path; the
/// dispatcher reads them between dispatches to decide what to launch next.
#[repr(C)]
#[derive(Debug)]
pub struct IntegratorQueueCounter {
    pub num_queued: [i32; DEVICE_KERNEL_COUNT],
}

/// Host-side owner of the queue counters.
#[derive(Debug)]
pub struct QueueCounters {
    counts: [AtomicI32; DEVICE_KERNEL_COUNT],
}

impl QueueCounters {
    pub fn new() -> QueueCounters {
        QueueCounters {
            counts: core::array::from_fn(|_| AtomicI32::new(0)),
        }
    }

    #[inline]
    pub fn increment(&self, kernel: DeviceKernel) {
        self.counts[kernel as usize].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn decrement(&self, kernel: DeviceKernel) {
        self.counts[kernel as usize].fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self, kernel: DeviceKernel) -> i32 {
        self.counts[kernel as usize].load(Ordering::Relaxed)
    }

    /// Total queued paths across all stages.
    pub fn total(&self) -> i64 {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed) as i64)
            .sum()
    }

    pub fn clear(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// The counter block as device kernels address it. `AtomicI32` is
    /// layout-identical to `i32`, so the cast is sound for devices that
    /// access the words atomically.
    pub fn device_ptr(&self) -> *mut IntegratorQueueCounter {
        self.counts.as_ptr() as *mut IntegratorQueueCounter
    }
}

impl Default for QueueCounters {
    fn default() -> Self {
        QueueCounters::new()
    }
}

/// Per-shader queued-path counters for the shader-sorted shade stages.
#[derive(Debug)]
pub struct ShaderSortCounters {
    counters: Vec<AtomicI32>,
}

impl ShaderSortCounters {
    pub fn new(num_shaders: usize) -> ShaderSortCounters {
        ShaderSortCounters {
            counters: (0..num_shaders).map(|_| AtomicI32::new(0)).collect(),
        }
    }

    #[inline]
    pub fn increment(&self, shader: u32) {
        self.counters[shader as usize].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn count(&self, shader: u32) -> i32 {
        self.counters[shader as usize].load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn device_ptr(&self) -> *mut i32 {
        self.counters.as_ptr() as *mut i32
    }
}
