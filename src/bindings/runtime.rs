//! Binding runtime: lifecycle state machine and the context every proxy
//! hangs off.
//!
//! ```text
//!                 initialize()              shutdown()
//! Uninitialized ──────────────▶ Initialized ───────────▶ ShuttingDown
//!                                    ▲                        │
//!                                    └──────── initialize() ──┘
//! ```
//!
//! The shutting-down flag is the gate that keeps drop-driven finalizers away
//! from native code once the native library may be torn down. It stays
//! closed after `shutdown()` returns, until the next `initialize()`.

use super::kind::ProxyKind;
use super::native::{NativeApi, NativeEvent, NativeEventKind};
use super::proxy::{NativeObject, Proxy, RefCounted, RefCountedExt};
use super::registry::{HandleRegistry, Strength};
use super::Handle;
use crate::config::InteropConfig;
use crate::core::error::{BindingError, BindingResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Observable lifecycle state.
///
/// `ShuttingDown` is also the resting state once `shutdown()` has returned:
/// the native gate stays closed until the next `initialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuntimeState {
    Uninitialized,
    Initialized,
    /// Shutdown has started or completed; not a transient phase.
    ShuttingDown,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    setup: AtomicBool,
    initialized: AtomicBool,
    shutting_down: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

pub(crate) struct RuntimeShared {
    pub(crate) registry: HandleRegistry,
    pub(crate) lifecycle: Lifecycle,
    native: Arc<dyn NativeApi>,
}

impl RuntimeShared {
    fn handle_native_event(&self, event: NativeEvent) {
        match event.kind {
            NativeEventKind::AddRef => {
                tracing::trace!(target: "interop", "native add-ref {}", event.handle);
            }
            NativeEventKind::Delete => match self.registry.lookup(event.handle) {
                Some(object) => object.handle_native_delete(),
                None => {
                    tracing::trace!(
                        target: "interop",
                        "native delete {} has no live proxy",
                        event.handle
                    );
                }
            },
        }
    }
}

/// Owns the handle registry and the native API, and gates both with the
/// lifecycle flags. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<RuntimeShared>,
}

impl Runtime {
    pub fn new(native: Arc<dyn NativeApi>) -> Self {
        Self::with_registry(native, HandleRegistry::new())
    }

    pub fn with_registry(native: Arc<dyn NativeApi>, registry: HandleRegistry) -> Self {
        Self {
            shared: Arc::new(RuntimeShared {
                registry,
                lifecycle: Lifecycle::default(),
                native,
            }),
        }
    }

    /// Build a runtime from configuration, running [`setup`](Self::setup)
    /// when `runtime.auto_setup` is set.
    pub fn from_config(native: Arc<dyn NativeApi>, config: &InteropConfig) -> Self {
        let runtime = Self::with_registry(native, HandleRegistry::with_shards(config.registry.shards));
        if config.runtime.auto_setup {
            runtime.setup();
        }
        runtime
    }

    /// Install the native notification callback. Only the first call has
    /// any effect; returns whether this call installed it.
    pub fn setup(&self) -> bool {
        if self.shared.lifecycle.setup.swap(true, Ordering::AcqRel) {
            return false;
        }

        let shared = Arc::downgrade(&self.shared);
        self.shared
            .native
            .set_notification_callback(Arc::new(move |event: NativeEvent| {
                if let Some(shared) = shared.upgrade() {
                    shared.handle_native_event(event);
                }
            }));
        tracing::debug!(target: "interop", "native notification callback installed");
        true
    }

    pub fn initialize(&self) {
        let lifecycle = &self.shared.lifecycle;
        lifecycle.shutting_down.store(false, Ordering::SeqCst);
        lifecycle.initialized.store(true, Ordering::SeqCst);
        tracing::info!(target: "interop", "runtime initialized");
    }

    /// Close the native gate, drain the registry and let every proxy the
    /// registry owned finalize while the gate is closed.
    pub fn shutdown(&self) {
        let lifecycle = &self.shared.lifecycle;
        if lifecycle.is_shutting_down() {
            tracing::debug!(target: "interop", "shutdown requested while already shut down");
            return;
        }
        if !lifecycle.is_initialized() {
            tracing::warn!(target: "interop", "shutdown requested before initialize");
        }

        lifecycle.shutting_down.store(true, Ordering::SeqCst);
        // Owned proxies are dropped inside clear(); their finalizers see the
        // closed gate and skip native code.
        let drained = self.shared.registry.clear();
        lifecycle.initialized.store(false, Ordering::SeqCst);
        tracing::info!(target: "interop", "runtime shut down, {} proxies released", drained);
    }

    pub fn state(&self) -> RuntimeState {
        let lifecycle = &self.shared.lifecycle;
        if lifecycle.is_shutting_down() {
            RuntimeState::ShuttingDown
        } else if lifecycle.is_initialized() {
            RuntimeState::Initialized
        } else {
            RuntimeState::Uninitialized
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.lifecycle.is_initialized()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.lifecycle.is_shutting_down()
    }

    pub fn is_setup(&self) -> bool {
        self.shared.lifecycle.setup.load(Ordering::Acquire)
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.shared.registry
    }

    pub fn native(&self) -> &Arc<dyn NativeApi> {
        &self.shared.native
    }

    /// Wrap a handle returned by native code in a new binding of type `T`
    /// and register it.
    ///
    /// Fails with `InvalidHandle` for a null handle, `ShuttingDown` while the
    /// gate is closed, `IdentityConflict` when an unrelated kind already owns
    /// the handle, and passes native query failures through.
    pub fn wrap<T, F>(
        &self,
        handle: Handle,
        kind: &'static ProxyKind,
        build: F,
    ) -> BindingResult<Arc<T>>
    where
        T: RefCounted + Any,
        F: FnOnce(Proxy) -> T,
    {
        if handle.is_null() {
            return Err(BindingError::InvalidHandle { kind: kind.name() });
        }
        if self.is_shutting_down() {
            return Err(BindingError::ShuttingDown { handle });
        }

        let refs = self.shared.native.refs(handle)?;
        let proxy = Proxy::new(
            handle,
            kind,
            Arc::clone(&self.shared.native),
            Arc::downgrade(&self.shared),
        )?;
        let object = Arc::new(build(proxy));
        debug_assert_eq!(object.proxy().handle(), handle);

        let erased: Arc<dyn RefCounted> = object.clone();
        if let Err(err) = self
            .shared
            .registry
            .register(handle, &erased, Strength::decide(refs, kind))
        {
            object.proxy().disarm();
            return Err(err);
        }
        Ok(object)
    }

    /// [`wrap`](Self::wrap) for kinds without host state.
    pub fn bind(&self, handle: Handle, kind: &'static ProxyKind) -> BindingResult<Arc<NativeObject>> {
        self.wrap(handle, kind, NativeObject::new)
    }

    pub fn lookup(&self, handle: Handle) -> Option<Arc<dyn RefCounted>> {
        self.shared.registry.lookup(handle)
    }

    pub fn lookup_as<T: RefCounted + Any>(&self, handle: Handle) -> Option<Arc<T>> {
        self.shared.registry.lookup_as(handle)
    }

    /// Entry point of the native notification channel.
    pub fn handle_native_event(&self, event: NativeEvent) {
        self.shared.handle_native_event(event);
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state())
            .field("setup", &self.is_setup())
            .field("registry", &self.shared.registry)
            .finish()
    }
}
