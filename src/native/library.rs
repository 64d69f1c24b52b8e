//! 动态加载的原生引擎库
//!
//! 通过 libloading 解析引擎导出的 C 入口：
//!
//! ```c
//! uint32_t ref_counted_refs(void* handle);
//! uint32_t ref_counted_weak_refs(void* handle);
//! void     ref_counted_try_delete(void* handle);
//! void     ref_counted_set_notify(void (*cb)(void* user, uint32_t kind, void* handle), void* user);
//! ```

use crate::bindings::native::{NativeApi, NativeEvent, NativeEventKind, NotificationCallback};
use crate::bindings::Handle;
use crate::core::error::{NativeError, NativeResult};
use libloading::Library;
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

type RefsFn = unsafe extern "C" fn(*mut c_void) -> u32;
type TryDeleteFn = unsafe extern "C" fn(*mut c_void);
type NotifyFn = extern "C" fn(*mut c_void, u32, *mut c_void);
type SetNotifyFn = unsafe extern "C" fn(Option<NotifyFn>, *mut c_void);

type CallbackSlot = RwLock<Option<NotificationCallback>>;

pub const REFS_SYMBOL: &str = "ref_counted_refs";
pub const WEAK_REFS_SYMBOL: &str = "ref_counted_weak_refs";
pub const TRY_DELETE_SYMBOL: &str = "ref_counted_try_delete";
pub const SET_NOTIFY_SYMBOL: &str = "ref_counted_set_notify";

/// 原生引擎库句柄
pub struct NativeLibrary {
    refs: RefsFn,
    weak_refs: RefsFn,
    try_delete: TryDeleteFn,
    set_notify: SetNotifyFn,
    // Boxed so the address handed to native code stays put.
    callback: Box<CallbackSlot>,
    notify_installed: AtomicBool,
    path: PathBuf,
    // Declared last: the function pointers above must not outlive it.
    _library: Library,
}

impl NativeLibrary {
    /// 加载库并解析全部入口
    pub fn open(path: impl AsRef<Path>) -> NativeResult<Self> {
        let path = path.as_ref();
        // SAFETY: loading runs the library's initializers; callers point this
        // at the engine library, whose initializers have no preconditions.
        let library = unsafe { Library::new(path) }
            .map_err(|e| NativeError::LibraryLoad(format!("{}: {}", path.display(), e)))?;

        // SAFETY: the signatures match the engine's exported C API above.
        let (refs, weak_refs, try_delete, set_notify) = unsafe {
            (
                symbol::<RefsFn>(&library, REFS_SYMBOL)?,
                symbol::<RefsFn>(&library, WEAK_REFS_SYMBOL)?,
                symbol::<TryDeleteFn>(&library, TRY_DELETE_SYMBOL)?,
                symbol::<SetNotifyFn>(&library, SET_NOTIFY_SYMBOL)?,
            )
        };

        tracing::info!(target: "native", "loaded native library {}", path.display());
        Ok(Self {
            refs,
            weak_refs,
            try_delete,
            set_notify,
            callback: Box::new(RwLock::new(None)),
            notify_installed: AtomicBool::new(false),
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// # Safety
///
/// `T` must match the real type of the exported symbol.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> NativeResult<T> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    library
        .get::<T>(&bytes)
        .map(|symbol| *symbol)
        .map_err(|e| NativeError::MissingSymbol {
            symbol: name,
            reason: e.to_string(),
        })
}

extern "C" fn notify_trampoline(user_data: *mut c_void, kind: u32, handle: *mut c_void) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let Some(kind) = NativeEventKind::from_raw(kind) else {
            tracing::warn!(target: "native", "unknown notification kind {}", kind);
            return;
        };
        // SAFETY: user_data is the callback slot owned by the NativeLibrary
        // that registered this trampoline; the registration is withdrawn in
        // Drop before the slot is freed.
        let slot = unsafe { &*(user_data as *const CallbackSlot) };
        let callback = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(NativeEvent {
                kind,
                handle: Handle::from_ptr(handle),
            });
        }
    }));

    if outcome.is_err() {
        tracing::error!(target: "native", "notification handler panicked");
    }
}

impl NativeApi for NativeLibrary {
    fn refs(&self, handle: Handle) -> NativeResult<u32> {
        // SAFETY: resolved from the loaded library, which outlives self.
        Ok(unsafe { (self.refs)(handle.as_ptr()) })
    }

    fn weak_refs(&self, handle: Handle) -> NativeResult<u32> {
        // SAFETY: as above.
        Ok(unsafe { (self.weak_refs)(handle.as_ptr()) })
    }

    fn try_delete(&self, handle: Handle) {
        // SAFETY: as above; native code ignores objects still referenced.
        unsafe { (self.try_delete)(handle.as_ptr()) }
    }

    fn set_notification_callback(&self, callback: NotificationCallback) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
        if self.notify_installed.swap(true, Ordering::AcqRel) {
            return;
        }

        let user_data = &*self.callback as *const CallbackSlot as *mut c_void;
        // SAFETY: the slot is heap-allocated and lives as long as self.
        unsafe { (self.set_notify)(Some(notify_trampoline as NotifyFn), user_data) };
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        if self.notify_installed.load(Ordering::Acquire) {
            // SAFETY: withdraws the trampoline before the slot and the library go away.
            unsafe { (self.set_notify)(None, ptr::null_mut()) };
        }
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("notify_installed", &self.notify_installed.load(Ordering::Relaxed))
            .finish()
    }
}
