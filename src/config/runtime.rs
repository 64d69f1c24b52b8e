use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 分片数上限
pub const MAX_SHARDS: usize = 1024;

/// 句柄注册表配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 分片数，向上取整到2的幂
    pub shards: usize,
}

impl_default!(RegistryConfig {
    shards: default_shards(),
});

/// 按CPU核数估算分片数
fn default_shards() -> usize {
    (num_cpus::get() * 4).next_power_of_two().min(MAX_SHARDS)
}

impl RegistryConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.shards == 0 || self.shards > MAX_SHARDS {
            return Err(ConfigError::ValidationError(format!(
                "Registry shard count must be within 1..={MAX_SHARDS}, got {}",
                self.shards
            )));
        }
        Ok(())
    }
}

/// 运行时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// 原生引擎库路径，`None` 时由调用方提供 `NativeApi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_library: Option<PathBuf>,

    /// 构建运行时时立即安装原生通知回调
    pub auto_setup: bool,
}

impl_default!(RuntimeConfig {
    native_library: None,
    auto_setup: true,
});

impl RuntimeConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(path) = &self.native_library {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Native library path is empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
