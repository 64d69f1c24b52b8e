//! Opaque native object handles.

use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::fmt;

/// An address-sized reference to a native object.
///
/// The host never dereferences a handle. Equality is by bit value, and the
/// native allocator is free to hand the same value out again once the
/// previous owner has been deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    /// The null handle. Never wraps a live object.
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
