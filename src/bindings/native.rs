//! The native side of the binding boundary.
//!
//! Everything the binding layer needs from the engine fits in four entry
//! points: the two reference count queries, a best-effort delete request and
//! the registration of a notification callback. Back-ends live in
//! [`crate::native`].

use super::Handle;
use crate::core::error::NativeResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of a native-to-host notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum NativeEventKind {
    AddRef = 0,
    Delete = 1,
}

impl NativeEventKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::AddRef),
            1 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A notification raised by native code about one of its objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub kind: NativeEventKind,
    pub handle: Handle,
}

impl NativeEvent {
    pub fn add_ref(handle: Handle) -> Self {
        Self {
            kind: NativeEventKind::AddRef,
            handle,
        }
    }

    pub fn delete(handle: Handle) -> Self {
        Self {
            kind: NativeEventKind::Delete,
            handle,
        }
    }
}

/// Host callback invoked by native code. May be called from any thread.
pub type NotificationCallback = Arc<dyn Fn(NativeEvent) + Send + Sync>;

/// Native reference-counting entry points.
///
/// Errors returned by the queries are passed through the binding layer
/// untouched.
pub trait NativeApi: Send + Sync {
    /// Current strong reference count.
    fn refs(&self, handle: Handle) -> NativeResult<u32>;

    /// Current weak reference count.
    fn weak_refs(&self, handle: Handle) -> NativeResult<u32>;

    /// Ask native code to free the object if nothing references it.
    /// Declining is not a failure.
    fn try_delete(&self, handle: Handle);

    /// Install the host notification callback, replacing any previous one.
    fn set_notification_callback(&self, callback: NotificationCallback);
}
