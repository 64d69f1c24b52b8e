//! 应用引导
//!
//! 原生引擎在启动和退出时回调宿主。`ApplicationHost` 按原生句柄保存受管
//! 应用，并用这两个回调包围运行时的生命周期：
//!
//! - 启动：`Runtime::initialize`，设置当前应用，调用 `Application::initialize`，
//!   然后通知初始化监听者
//! - 退出：调用 `Application::shutdown`，`Runtime::shutdown`，清除当前应用
//!
//! 回调、监听者都在内部锁之外执行，可以重新进入宿主。

use crate::bindings::{Handle, Runtime};
use crate::config::ApplicationSettings;
use crate::core::error::{ApplicationError, ApplicationResult};
use crate::ffi::RawApplicationSettings;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// 宿主侧应用
pub trait Application: Send + Sync {
    /// 运行时初始化之后调用
    fn initialize(&self) {}

    /// 运行时关闭之前调用
    fn shutdown(&self) {}
}

/// 初始化监听者，参数为刚初始化的应用句柄
pub type InitializedListener = Arc<dyn Fn(Handle) + Send + Sync>;

type Current = Option<(Handle, Arc<dyn Application>)>;

/// 受管应用表与引导回调
pub struct ApplicationHost {
    runtime: Runtime,
    settings: ApplicationSettings,
    apps: RwLock<HashMap<Handle, Arc<dyn Application>>>,
    current: RwLock<Current>,
    listeners: RwLock<Vec<InitializedListener>>,
}

impl ApplicationHost {
    pub fn new(runtime: Runtime, settings: ApplicationSettings) -> Self {
        Self {
            runtime,
            settings,
            apps: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn settings(&self) -> &ApplicationSettings {
        &self.settings
    }

    /// 原生 `app_new` 所需的启动参数
    pub fn raw_settings(&self) -> RawApplicationSettings {
        RawApplicationSettings::from(&self.settings)
    }

    /// 登记原生应用句柄对应的宿主应用，返回被替换的旧应用
    pub fn register(
        &self,
        handle: Handle,
        app: Arc<dyn Application>,
    ) -> Option<Arc<dyn Application>> {
        tracing::debug!(target: "app", "registered application {}", handle);
        self.apps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, app)
    }

    pub fn unregister(&self, handle: Handle) -> Option<Arc<dyn Application>> {
        self.apps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.apps.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, handle: Handle) -> ApplicationResult<Arc<dyn Application>> {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned()
            .ok_or(ApplicationError::NotFound(handle))
    }

    /// 当前应用，仅在启动与退出回调之间可用
    pub fn current(&self) -> ApplicationResult<Arc<dyn Application>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, app)| Arc::clone(app))
            .ok_or(ApplicationError::NotConfigured)
    }

    pub fn current_handle(&self) -> ApplicationResult<Handle> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(handle, _)| *handle)
            .ok_or(ApplicationError::NotConfigured)
    }

    /// 添加初始化监听者
    pub fn on_initialized(&self, listener: InitializedListener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// 原生启动回调
    ///
    /// 未登记的句柄返回 `NotFound`，运行时保持原状态。
    pub fn on_native_initialize(&self, handle: Handle) -> ApplicationResult<()> {
        let app = self.find(handle)?;

        self.runtime.initialize();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Some((handle, Arc::clone(&app)));
        tracing::info!(target: "app", "application {} initializing", handle);

        app.initialize();

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(handle);
        }
        Ok(())
    }

    /// 原生退出回调
    pub fn on_native_exiting(&self, handle: Handle) -> ApplicationResult<()> {
        let app = self.find(handle)?;

        tracing::info!(target: "app", "application {} exiting", handle);
        app.shutdown();
        self.runtime.shutdown();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

impl fmt::Debug for ApplicationHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationHost")
            .field("settings", &self.settings)
            .field("applications", &self.len())
            .field("current", &self.current_handle().ok())
            .field("runtime", &self.runtime)
            .finish()
    }
}
