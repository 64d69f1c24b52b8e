//! 进程内原生对象堆
//!
//! 模拟引擎的引用计数对象模型：
//! - 新建对象的强引用计数为 0
//! - `release` 使计数归零时立即删除对象
//! - `try_delete` 只在计数为 0 时删除
//! - 已释放的地址按后进先出复用
//!
//! 通知回调总是在内部锁释放之后调用，回调可以重新进入堆。

use crate::bindings::native::{NativeApi, NativeEvent, NotificationCallback};
use crate::bindings::Handle;
use crate::core::error::{NativeError, NativeResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

const BASE_ADDRESS: usize = 0x1000;
const SLOT_STRIDE: usize = 0x40;

#[derive(Debug, Default, Clone, Copy)]
struct RefCount {
    refs: u32,
    weak_refs: u32,
}

#[derive(Debug, Default)]
struct HeapState {
    objects: HashMap<Handle, RefCount>,
    free: Vec<Handle>,
    next: usize,
}

/// 引用计数对象堆
pub struct NativeHeap {
    state: Mutex<HeapState>,
    callback: RwLock<Option<NotificationCallback>>,
    try_delete_requests: AtomicUsize,
    deletions: AtomicUsize,
    callback_installs: AtomicUsize,
}

impl NativeHeap {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeapState::default()),
            callback: RwLock::new(None),
            try_delete_requests: AtomicUsize::new(0),
            deletions: AtomicUsize::new(0),
            callback_installs: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, HeapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: NativeEvent) {
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// 创建新对象，强引用计数为 0
    pub fn create(&self) -> Handle {
        let mut state = self.state();
        let handle = match state.free.pop() {
            Some(handle) => handle,
            None => {
                let handle = Handle::from_raw(BASE_ADDRESS + state.next * SLOT_STRIDE);
                state.next += 1;
                handle
            }
        };
        state.objects.insert(handle, RefCount::default());
        tracing::trace!(target: "native", "created {}", handle);
        handle
    }

    /// 增加强引用，返回新的计数
    pub fn add_ref(&self, handle: Handle) -> NativeResult<u32> {
        let refs = {
            let mut state = self.state();
            let count = state
                .objects
                .get_mut(&handle)
                .ok_or(NativeError::StaleHandle { call: "add_ref", handle })?;
            count.refs += 1;
            count.refs
        };
        self.notify(NativeEvent::add_ref(handle));
        Ok(refs)
    }

    /// 释放强引用，计数归零时删除对象
    pub fn release(&self, handle: Handle) -> NativeResult<u32> {
        let refs = {
            let mut state = self.state();
            let count = state
                .objects
                .get_mut(&handle)
                .ok_or(NativeError::StaleHandle { call: "release", handle })?;
            if count.refs == 0 {
                return Err(NativeError::RefCountUnderflow { call: "release", handle });
            }
            count.refs -= 1;
            let refs = count.refs;
            if refs == 0 {
                Self::free(&mut state, handle);
            }
            refs
        };

        if refs == 0 {
            self.deleted(handle);
        }
        Ok(refs)
    }

    pub fn add_weak_ref(&self, handle: Handle) -> NativeResult<u32> {
        let mut state = self.state();
        let count = state
            .objects
            .get_mut(&handle)
            .ok_or(NativeError::StaleHandle { call: "add_weak_ref", handle })?;
        count.weak_refs += 1;
        Ok(count.weak_refs)
    }

    pub fn release_weak_ref(&self, handle: Handle) -> NativeResult<u32> {
        let mut state = self.state();
        let count = state
            .objects
            .get_mut(&handle)
            .ok_or(NativeError::StaleHandle { call: "release_weak_ref", handle })?;
        if count.weak_refs == 0 {
            return Err(NativeError::RefCountUnderflow { call: "release_weak_ref", handle });
        }
        count.weak_refs -= 1;
        Ok(count.weak_refs)
    }

    /// 无视引用计数强制删除，返回对象是否存在
    pub fn destroy(&self, handle: Handle) -> bool {
        let existed = Self::free(&mut self.state(), handle);
        if existed {
            self.deleted(handle);
        }
        existed
    }

    pub fn is_alive(&self, handle: Handle) -> bool {
        self.state().objects.contains_key(&handle)
    }

    pub fn live_objects(&self) -> usize {
        self.state().objects.len()
    }

    /// 通过 `NativeApi::try_delete` 收到的删除请求次数
    pub fn try_delete_requests(&self) -> usize {
        self.try_delete_requests.load(Ordering::SeqCst)
    }

    pub fn deletions(&self) -> usize {
        self.deletions.load(Ordering::SeqCst)
    }

    pub fn callback_installs(&self) -> usize {
        self.callback_installs.load(Ordering::SeqCst)
    }

    fn free(state: &mut HeapState, handle: Handle) -> bool {
        if state.objects.remove(&handle).is_some() {
            state.free.push(handle);
            true
        } else {
            false
        }
    }

    fn deleted(&self, handle: Handle) {
        self.deletions.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(target: "native", "deleted {}", handle);
        self.notify(NativeEvent::delete(handle));
    }
}

impl Default for NativeHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHeap")
            .field("live_objects", &self.live_objects())
            .field("deletions", &self.deletions())
            .field("try_delete_requests", &self.try_delete_requests())
            .finish()
    }
}

impl NativeApi for NativeHeap {
    fn refs(&self, handle: Handle) -> NativeResult<u32> {
        self.state()
            .objects
            .get(&handle)
            .map(|count| count.refs)
            .ok_or(NativeError::StaleHandle { call: "refs", handle })
    }

    fn weak_refs(&self, handle: Handle) -> NativeResult<u32> {
        self.state()
            .objects
            .get(&handle)
            .map(|count| count.weak_refs)
            .ok_or(NativeError::StaleHandle { call: "weak_refs", handle })
    }

    fn try_delete(&self, handle: Handle) {
        self.try_delete_requests.fetch_add(1, Ordering::SeqCst);
        let freed = {
            let mut state = self.state();
            match state.objects.get(&handle) {
                Some(count) if count.refs == 0 => Self::free(&mut state, handle),
                _ => false,
            }
        };
        if freed {
            self.deleted(handle);
        }
    }

    fn set_notification_callback(&self, callback: NotificationCallback) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
        self.callback_installs.fetch_add(1, Ordering::SeqCst);
    }
}
