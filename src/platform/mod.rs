//! 平台识别
//!
//! 编译目标对应的平台标识与平台族，数值与引擎 C 接口一致。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 平台标识
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformId {
    Unknown = 0,
    Windows = 1,
    /// Windows 通用平台
    Uwp = 2,
    XboxOne = 3,
    Linux = 4,
    MacOS = 5,
    Android = 6,
    IOS = 7,
    AppleTV = 8,
    Web = 9,
}

/// 平台族
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformFamily {
    Unknown = 0,
    Desktop = 1,
    Mobile = 2,
    Console = 3,
}

impl PlatformId {
    /// 检测当前平台
    pub const fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Web
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::IOS
        } else if cfg!(target_os = "tvos") {
            Self::AppleTV
        } else {
            Self::Unknown
        }
    }

    /// 从C接口的数值转换
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Unknown,
            1 => Self::Windows,
            2 => Self::Uwp,
            3 => Self::XboxOne,
            4 => Self::Linux,
            5 => Self::MacOS,
            6 => Self::Android,
            7 => Self::IOS,
            8 => Self::AppleTV,
            9 => Self::Web,
            _ => return None,
        })
    }

    pub const fn family(self) -> PlatformFamily {
        match self {
            Self::Windows | Self::Linux | Self::MacOS => PlatformFamily::Desktop,
            Self::Uwp | Self::Android | Self::IOS | Self::Web => PlatformFamily::Mobile,
            Self::XboxOne | Self::AppleTV => PlatformFamily::Console,
            Self::Unknown => PlatformFamily::Unknown,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Windows => "Windows",
            Self::Uwp => "UWP",
            Self::XboxOne => "Xbox One",
            Self::Linux => "Linux",
            Self::MacOS => "macOS",
            Self::Android => "Android",
            Self::IOS => "iOS",
            Self::AppleTV => "Apple TV",
            Self::Web => "Web",
        }
    }
}

impl PlatformFamily {
    pub fn current() -> Self {
        PlatformId::current().family()
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
