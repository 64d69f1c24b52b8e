//! Host-side proxies for native reference-counted objects.
//!
//! A concrete binding type embeds a [`Proxy`] and implements [`RefCounted`].
//! The proxy is destroyed exactly once, by whichever of these happens first:
//!
//! - explicit [`RefCountedExt::dispose`],
//! - a delete notification from native code ([`RefCountedExt::handle_native_delete`]),
//! - the drop of the last host reference (the finalizer path in `Drop`).
//!
//! All three funnel into the same check-and-set on the deleted flag; the
//! losers are no-ops.

use super::kind::ProxyKind;
use super::native::NativeApi;
use super::registry::Release;
use super::runtime::RuntimeShared;
use super::Handle;
use crate::core::error::{BindingError, BindingResult, NativeResult};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Identity and lifetime state shared by every bound object.
pub struct Proxy {
    handle: Handle,
    kind: &'static ProxyKind,
    serial: u64,
    deleted: AtomicBool,
    native: Arc<dyn NativeApi>,
    runtime: Weak<RuntimeShared>,
}

impl Proxy {
    pub(crate) fn new(
        handle: Handle,
        kind: &'static ProxyKind,
        native: Arc<dyn NativeApi>,
        runtime: Weak<RuntimeShared>,
    ) -> BindingResult<Self> {
        if handle.is_null() {
            return Err(BindingError::InvalidHandle { kind: kind.name() });
        }

        Ok(Self {
            handle,
            kind,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            deleted: AtomicBool::new(false),
            native,
            runtime,
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn kind(&self) -> &'static ProxyKind {
        self.kind
    }

    /// Unique per proxy instance, unlike the handle.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// True once the underlying native object is known to be gone.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn refs(&self) -> NativeResult<u32> {
        self.native.refs(self.handle)
    }

    pub fn weak_refs(&self) -> NativeResult<u32> {
        self.native.weak_refs(self.handle)
    }

    /// Flip the deleted flag. Only the caller that performs the transition
    /// gets `true`.
    pub(crate) fn mark_deleted(&self) -> bool {
        self.deleted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Neutralize a proxy that never made it into the registry, so dropping
    /// it touches neither native code nor the registry.
    pub(crate) fn disarm(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    fn request_native_delete(&self) {
        if !self.is_deleted() && self.kind.allows_native_delete() {
            tracing::trace!(target: "interop", "{}: try delete {}", self.kind, self.handle);
            self.native.try_delete(self.handle);
        }
    }

    fn unregister(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.registry.release(self.handle, self.serial);
        }
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        if self.is_deleted() {
            return;
        }

        // A runtime that is gone or shutting down means the native library
        // may already be unloaded.
        let Some(runtime) = self.runtime.upgrade() else {
            tracing::trace!(target: "interop", "{}: finalize {} after runtime drop", self.kind, self.handle);
            return;
        };

        // Release first: once a related kind has taken over the handle, the
        // native object belongs to the newer proxy.
        let release = runtime.registry.release(self.handle, self.serial);
        if runtime.lifecycle.is_shutting_down() || release == Release::Superseded {
            tracing::trace!(
                target: "interop",
                "{}: finalize {} without native call ({:?})",
                self.kind,
                self.handle,
                release
            );
            return;
        }

        tracing::trace!(target: "interop", "{}: finalize {}", self.kind, self.handle);
        self.native.try_delete(self.handle);
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.kind, other.kind) && self.handle == other.handle
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &self.kind.name())
            .field("handle", &self.handle)
            .field("serial", &self.serial)
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

/// Upcasting helper so type-erased registry entries can be downcast again.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A host type bound to a native reference-counted object.
pub trait RefCounted: AsAny + Send + Sync {
    fn proxy(&self) -> &Proxy;

    /// Runs once, when the object is disposed explicitly or deleted by
    /// native code. Never runs on the drop path.
    fn on_deleted(&self) {}
}

/// Operations shared by every [`RefCounted`] type.
pub trait RefCountedExt: RefCounted {
    fn handle(&self) -> Handle {
        self.proxy().handle()
    }

    fn kind(&self) -> &'static ProxyKind {
        self.proxy().kind()
    }

    fn is_deleted(&self) -> bool {
        self.proxy().is_deleted()
    }

    /// Forwarded to native code on every call; advisory only.
    fn reference_count(&self) -> NativeResult<u32> {
        self.proxy().refs()
    }

    /// Forwarded to native code on every call; advisory only.
    fn weak_reference_count(&self) -> NativeResult<u32> {
        self.proxy().weak_refs()
    }

    /// Ask native code to delete the object if nothing else holds it, then
    /// mark this proxy deleted and unregister it. Idempotent.
    fn dispose(&self) {
        self.proxy().request_native_delete();
        finish_deletion(self);
    }

    /// Native code already freed the object: mark deleted and unregister,
    /// without another delete request.
    fn handle_native_delete(&self) {
        tracing::trace!(
            target: "interop",
            "{}: native delete {}",
            self.kind(),
            self.handle()
        );
        finish_deletion(self);
    }

    /// Same kind and same handle.
    fn same_object(&self, other: &dyn RefCounted) -> bool {
        self.proxy() == other.proxy()
    }
}

impl<T: RefCounted + ?Sized> RefCountedExt for T {}

fn finish_deletion<T: RefCounted + ?Sized>(object: &T) {
    let proxy = object.proxy();
    if !proxy.mark_deleted() {
        return;
    }

    object.on_deleted();
    proxy.unregister();
}

/// Binding for kinds that carry no host state beyond the proxy.
#[derive(Debug)]
pub struct NativeObject {
    proxy: Proxy,
}

impl NativeObject {
    pub fn new(proxy: Proxy) -> Self {
        Self { proxy }
    }
}

impl RefCounted for NativeObject {
    fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}
