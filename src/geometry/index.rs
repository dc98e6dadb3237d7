//! Handle types for model entities.
//!
//! Model entities live in arenas owned by [`Model`](super::Model) and are
//! addressed by these type-safe handles, so a face cannot be looked up with
//! an edge handle by mistake.

use std::fmt::{self, Debug};

macro_rules! impl_handle {
    ($(#[$meta:meta])* $name:ident, $display:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a handle from a raw arena index.
            #[inline]
            pub fn new(index: usize) -> Self {
                debug_assert!(index < u32::MAX as usize, "index {} too large", index);
                Self(index as u32)
            }

            /// Create an invalid/null handle.
            #[inline]
            pub fn invalid() -> Self {
                Self(u32::MAX)
            }

            /// Get the raw arena index.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Check if this is a valid (non-null) handle.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", $display, self.0)
                } else {
                    write!(f, "{}(INVALID)", $display)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self::new(v)
            }
        }
    };
}

impl_handle!(
    /// Handle of a model vertex.
    VertexId,
    "V"
);
impl_handle!(
    /// Handle of a model edge (a bounded curve).
    EdgeId,
    "E"
);
impl_handle!(
    /// Handle of a model face (a trimmed surface).
    FaceId,
    "F"
);
impl_handle!(
    /// Handle of a model volume.
    VolumeId,
    "Vol"
);
