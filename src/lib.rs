//! # Engine Interop
//!
//! Host-side bindings for a native engine's reference-counted objects.
//!
//! The engine hands out opaque handles to objects it reference-counts; the
//! host wraps each handle in a proxy whose lifetime is governed by ordinary
//! Rust ownership. Either side may decide an object is dead first. This
//! crate keeps the two views consistent:
//!
//! - **Identity**: one live proxy per handle, held strongly or weakly by the
//!   [`bindings::HandleRegistry`] depending on native reference counts
//! - **Teardown**: explicit dispose, proxy drop and native delete
//!   notifications all funnel into one idempotent deletion
//! - **Lifecycle**: [`bindings::Runtime`] gates every native call so that no
//!   finalizer reaches the engine after shutdown
//!
//! ### Example
//!
//! ```
//! use engine_interop::bindings::{NativeApi, RefCountedExt, Runtime, REF_COUNTED};
//! use engine_interop::native::NativeHeap;
//! use std::sync::Arc;
//!
//! let heap = Arc::new(NativeHeap::new());
//! let native: Arc<dyn NativeApi> = heap.clone();
//! let runtime = Runtime::new(native);
//! runtime.setup();
//! runtime.initialize();
//!
//! let handle = heap.create();
//! let object = runtime.bind(handle, &REF_COUNTED).unwrap();
//! assert_eq!(object.reference_count(), Ok(0));
//!
//! object.dispose();
//! assert!(!heap.is_alive(handle));
//! runtime.shutdown();
//! ```
//!
//! ## Modules
//!
//! - [`bindings`]: handles, proxy kinds, the registry and the runtime
//! - [`native`]: native engine backends (in-process heap, shared library)
//! - [`app`]: application bootstrap callbacks
//! - [`config`]: configuration loading
//! - [`logging`]: tracing subscriber setup

/// Shared errors and macros
pub mod core;
/// Proxy bindings for native reference-counted objects
pub mod bindings;
/// Native engine backends
pub mod native;
/// Application bootstrap
pub mod app;
/// Configuration system
pub mod config;
/// Logging setup
pub mod logging;
/// Platform identification
pub mod platform;
/// C ABI helper types
pub mod ffi;

pub use bindings::{
    Handle, HandleRegistry, NativeApi, NativeObject, Proxy, ProxyKind, RefCounted, RefCountedExt,
    Runtime, RuntimeState, REF_COUNTED,
};
pub use config::InteropConfig;
pub use crate::core::error::{BindingError, BindingResult, NativeError};
