//! C ABI 辅助类型

use crate::config::ApplicationSettings;
use std::fmt;

/// 4字节布尔值，任意非零值为真
#[repr(transparent)]
#[derive(Clone, Copy, Default)]
pub struct RawBool(i32);

impl RawBool {
    pub const TRUE: RawBool = RawBool(1);
    pub const FALSE: RawBool = RawBool(0);

    pub const fn from_raw(value: i32) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for RawBool {
    fn from(value: bool) -> Self {
        if value {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }
}

impl From<RawBool> for bool {
    fn from(value: RawBool) -> Self {
        value.get()
    }
}

// Compared by truth value: C callers may hand back any non-zero int for true.
impl PartialEq for RawBool {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for RawBool {}

impl PartialEq<bool> for RawBool {
    fn eq(&self, other: &bool) -> bool {
        self.get() == *other
    }
}

impl fmt::Debug for RawBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBool({})", self.get())
    }
}

impl fmt::Display for RawBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.get(), f)
    }
}

/// 传给原生应用的启动参数
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawApplicationSettings {
    pub headless: RawBool,
    pub main_window_width: u32,
    pub main_window_height: u32,
}

impl From<&ApplicationSettings> for RawApplicationSettings {
    fn from(settings: &ApplicationSettings) -> Self {
        let (width, height) = settings.main_window_size;
        Self {
            headless: settings.headless.into(),
            main_window_width: width,
            main_window_height: height,
        }
    }
}
