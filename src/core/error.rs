//! 统一错误处理模块
//!
//! 提供绑定层范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **绑定层错误** (`BindingError`): 句柄校验、身份冲突、生命周期门控
//! - **原生层错误** (`NativeError`): 原生调用失败，原样透传，不做翻译
//! - **应用层错误** (`ApplicationError`): 应用引导回调相关
//!
//! 释放路径（dispose / drop / 原生删除通知）从不返回错误。

use crate::bindings::Handle;
use thiserror::Error;

/// 绑定层核心错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Attempted to instantiate a {kind} with a null handle")]
    InvalidHandle { kind: &'static str },

    #[error(
        "Identity conflict on handle {handle}: registered as {existing}, \
         claimed by unrelated kind {requested}"
    )]
    IdentityConflict {
        handle: Handle,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("Runtime is shutting down, refusing to bind handle {handle}")]
    ShuttingDown { handle: Handle },

    #[error("Native error: {0}")]
    Native(#[from] NativeError),

    #[error("Application error: {0}")]
    Application(#[from] ApplicationError),
}

/// 原生调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    #[error("Native call `{call}` rejected stale handle {handle}")]
    StaleHandle { call: &'static str, handle: Handle },

    #[error("Native call `{call}` would underflow the reference count of {handle}")]
    RefCountUnderflow { call: &'static str, handle: Handle },

    #[error("Failed to load native library: {0}")]
    LibraryLoad(String),

    #[error("Missing native symbol `{symbol}`: {reason}")]
    MissingSymbol { symbol: &'static str, reason: String },
}

/// 应用引导错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("The application is not configured yet")]
    NotConfigured,

    #[error("No managed application for handle {0}")]
    NotFound(Handle),
}

/// 绑定层结果类型别名
pub type BindingResult<T> = Result<T, BindingError>;
pub type NativeResult<T> = Result<T, NativeError>;
pub type ApplicationResult<T> = Result<T, ApplicationError>;
