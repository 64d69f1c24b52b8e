/// 应用引导配置
use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 原生应用启动参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSettings {
    /// 应用名称
    pub name: String,

    /// 无窗口运行
    pub headless: bool,

    /// 主窗口标题
    pub main_window_title: String,

    /// 主窗口尺寸 (宽, 高)
    pub main_window_size: (u32, u32),
}

impl_default!(ApplicationSettings {
    name: "Engine".to_string(),
    headless: false,
    main_window_title: "Engine".to_string(),
    main_window_size: (1280, 720),
});

impl ApplicationSettings {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Application name is empty".to_string(),
            ));
        }
        let (width, height) = self.main_window_size;
        if !self.headless && (width == 0 || height == 0) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid main window size {width}x{height}"
            )));
        }
        Ok(())
    }
}
