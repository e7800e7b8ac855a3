//! Path identity.
//!
//! On the CPU a path is addressed by reference: each worker thread owns one
//! [`IntegratorStateCpu`](crate::aos::IntegratorStateCpu) on its stack. On
//! GPU backends a path is a plain integer index into the SoA arrays, playing
//! the role of a pointer, with `-1` as the null sentinel. The newtypes here
//! keep main-path and shadow-path indices from being mixed up.

use cust_core::DeviceCopy;

macro_rules! index_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, DeviceCopy)]
        pub struct $name(i32);

        impl $name {
            /// The "no path" sentinel.
            pub const NONE: $name = $name(-1);

            #[inline]
            pub const fn new(index: u32) -> $name {
                $name(index as i32)
            }

            /// The raw slot index. Must not be called on [`Self::NONE`].
            #[inline]
            pub fn index(self) -> usize {
                debug_assert!(!self.is_none());
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> i32 {
                self.0
            }

            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 < 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::NONE
            }
        }
    };
}

index_newtype! {
    /// Index of a main-path slot in the SoA state.
    PathIndex
}

index_newtype! {
    /// Index of a shadow-path slot in the SoA state.
    ShadowPathIndex
}
