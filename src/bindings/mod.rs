//! Language Binding Layer (FFI)
//!
//! Host-side proxies for the engine's native reference-counted objects.
//! Two collectors decide independently when an object dies: native code
//! through its reference counts, and the host through the drop of its last
//! proxy reference. This module keeps identity and lifetime consistent
//! between them.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Host Bindings                           │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐                   │
//! │  │ Texture  │  │  Scene   │  │   App    │  impl RefCounted  │
//! │  └────┬─────┘  └────┬─────┘  └────┬─────┘                   │
//! │       │  dispose / drop           │                         │
//! │       v             v             v                         │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │   Runtime (lifecycle gate) + HandleRegistry         │   │
//! │  │      Handle -> proxy, strong | weak                 │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │          refs / try_delete│   ▲ add-ref / delete            │
//! │                          v   │                              │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │          NativeApi (heap or shared library)         │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handle;
pub mod kind;
pub mod native;
pub mod proxy;
pub mod registry;
pub mod runtime;


pub use handle::Handle;
pub use kind::{ProxyKind, REF_COUNTED};
pub use native::{NativeApi, NativeEvent, NativeEventKind, NotificationCallback};
pub use proxy::{NativeObject, Proxy, RefCounted, RefCountedExt};
pub use registry::{HandleRegistry, Strength};
pub use runtime::{Runtime, RuntimeState};
