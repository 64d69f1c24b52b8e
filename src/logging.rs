//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者。`RUST_LOG` 存在时优先，
//! 否则使用配置中的级别。重复调用无副作用。

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// 按配置安装全局订阅者，返回本次调用是否完成了安装
pub fn init(config: &LoggingConfig) -> bool {
    if !config.log_to_console {
        return false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(target: "interop", "logging initialized at {}", config.level);
    }
    installed
}
