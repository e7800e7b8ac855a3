//! Field-table machinery for the structure-of-arrays layout.
//!
//! The SoA layout needs the same inventory of fields expanded three ways: a
//! host-owned array per field, a device-visible pointer block, and accessor
//! families. Rather than maintaining those expansions by hand, each group
//! declares its fields once through [`soa_plain_group!`] or
//! [`soa_array_group!`] and the macro emits all of it. The declared tables
//! are cross-checked against `wavefront_core::schema` by tests, so the macro
//! tables, the CPU structs, and the schema cannot drift apart.
//!
//! Fields whose owning feature is disabled in the arena's mask allocate no
//! storage and expose a null pointer in the block; touching such a field
//! through the host accessors is a contract violation and panics rather than
//! reading garbage. Device kernels go through the raw pointer block and are
//! trusted, as the dispatcher guarantees they are specialized to the same
//! mask.

use wavefront_core::KernelFeatures;

pub(crate) fn alloc_field<T: bytemuck::Zeroable + Copy>(
    owner: Option<KernelFeatures>,
    features: KernelFeatures,
    len: usize,
) -> Vec<T> {
    if owner.map_or(true, |flag| features.contains(flag)) {
        vec![T::zeroed(); len]
    } else {
        Vec::new()
    }
}

pub(crate) fn field_ptr<T>(field: &mut Vec<T>) -> *mut T {
    if field.is_empty() {
        core::ptr::null_mut()
    } else {
        field.as_mut_ptr()
    }
}

pub(crate) fn element_ptr<T>(field: &mut Vec<T>, element: usize, num_slots: usize) -> *mut T {
    if field.is_empty() {
        core::ptr::null_mut()
    } else {
        // Element arrays are laid out back to back in one allocation.
        unsafe { field.as_mut_ptr().add(element * num_slots) }
    }
}

/// Declares a one-record-per-slot SoA group: the host storage struct, its
/// device pointer block, per-field accessors, and the slot-copy primitive
/// compaction is built from.
macro_rules! soa_plain_group {
    (
        $(#[$doc:meta])*
        group $group:ident {
            $( $(#[$fattr:meta])* $field:ident : $ty:ty => $feature:expr, )*
        }
    ) => { paste::paste! {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct [<$group:camel Soa>] {
            $( $(#[$fattr])* $field: Vec<$ty>, )*
        }

        /// Device-visible pointer block for the group. Feature-disabled
        /// fields are null.
        #[repr(C)]
        #[derive(Debug, Clone, Copy)]
        pub struct [<$group:camel SoaPtrs>] {
            $( $(#[$fattr])* pub $field: *mut $ty, )*
        }

        unsafe impl ::cust_core::DeviceCopy for [<$group:camel SoaPtrs>] {}

        impl [<$group:camel Soa>] {
            pub(crate) fn alloc(features: KernelFeatures, num_slots: usize) -> Self {
                Self {
                    $( $(#[$fattr])*
                       $field: crate::layout::alloc_field::<$ty>($feature, features, num_slots), )*
                }
            }

            pub(crate) fn ptrs(&mut self) -> [<$group:camel SoaPtrs>] {
                [<$group:camel SoaPtrs>] {
                    $( $(#[$fattr])* $field: crate::layout::field_ptr(&mut self.$field), )*
                }
            }

            pub(crate) fn copy_slot(&mut self, to: usize, from: usize) {
                $( $(#[$fattr])* {
                    if !self.$field.is_empty() {
                        self.$field[to] = self.$field[from];
                    }
                } )*
            }

            /// Names of the fields compiled into this group, in declaration
            /// order.
            pub fn field_names() -> Vec<&'static str> {
                let mut names = Vec::new();
                $( $(#[$fattr])* names.push(stringify!($field)); )*
                names
            }

            $(
                $(#[$fattr])*
                #[inline]
                pub fn $field(&self, slot: usize) -> $ty {
                    self.$field[slot]
                }

                $(#[$fattr])*
                #[inline]
                pub fn [<set_ $field>](&mut self, slot: usize, value: $ty) {
                    self.$field[slot] = value;
                }
            )*
        }
    }};
}

/// Declares a fixed-capacity array SoA group. Each array element gets its
/// own pointer block entry, so element `i` of every slot lives in one
/// contiguous device array.
macro_rules! soa_array_group {
    (
        $(#[$doc:meta])*
        group $group:ident [ $cap:tt ] {
            $( $(#[$fattr:meta])* $field:ident : $ty:ty => $feature:expr, )*
        }
    ) => { paste::paste! {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct [<$group:camel Soa>] {
            num_slots: usize,
            $( $(#[$fattr])* $field: Vec<$ty>, )*
        }

        /// Device-visible pointer block for one array element of the group.
        #[repr(C)]
        #[derive(Debug, Clone, Copy)]
        pub struct [<$group:camel SoaPtrs>] {
            $( $(#[$fattr])* pub $field: *mut $ty, )*
        }

        unsafe impl ::cust_core::DeviceCopy for [<$group:camel SoaPtrs>] {}

        impl [<$group:camel Soa>] {
            pub const CAPACITY: usize = $cap;

            pub(crate) fn alloc(features: KernelFeatures, num_slots: usize) -> Self {
                Self {
                    num_slots,
                    $( $(#[$fattr])*
                       $field: crate::layout::alloc_field::<$ty>($feature, features, num_slots * $cap), )*
                }
            }

            pub(crate) fn ptrs(&mut self) -> [[<$group:camel SoaPtrs>]; $cap] {
                ::core::array::from_fn(|element| [<$group:camel SoaPtrs>] {
                    $( $(#[$fattr])*
                       $field: crate::layout::element_ptr(&mut self.$field, element, self.num_slots), )*
                })
            }

            pub(crate) fn copy_slot(&mut self, to: usize, from: usize) {
                for element in 0..$cap {
                    $( $(#[$fattr])* {
                        if !self.$field.is_empty() {
                            let base = element * self.num_slots;
                            self.$field[base + to] = self.$field[base + from];
                        }
                    } )*
                }
            }

            /// Names of the fields compiled into this group, in declaration
            /// order.
            pub fn field_names() -> Vec<&'static str> {
                let mut names = Vec::new();
                $( $(#[$fattr])* names.push(stringify!($field)); )*
                names
            }

            $(
                $(#[$fattr])*
                #[inline]
                pub fn $field(&self, element: usize, slot: usize) -> $ty {
                    self.$field[element * self.num_slots + slot]
                }

                $(#[$fattr])*
                #[inline]
                pub fn [<set_ $field>](&mut self, element: usize, slot: usize, value: $ty) {
                    self.$field[element * self.num_slots + slot] = value;
                }
            )*
        }
    }};
}

pub(crate) use soa_array_group;
pub(crate) use soa_plain_group;
