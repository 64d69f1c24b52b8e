/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和配置验证
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub mod application;
pub mod runtime;

pub use application::ApplicationSettings;
pub use runtime::{RegistryConfig, RuntimeConfig};

/// 配置文件名（不含扩展名）
pub const CONFIG_FILE_STEM: &str = "engine_interop";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "ENGINE_INTEROP_";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 绑定层主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteropConfig {
    /// 句柄注册表配置
    #[serde(default)]
    pub registry: RegistryConfig,

    /// 运行时配置
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 应用引导配置
    #[serde(default)]
    pub application: ApplicationSettings,
}

impl InteropConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 无法解析的值被忽略并保留原配置。
    pub fn apply_env_overrides(&mut self) {
        // 注册表
        if let Some(shards) = env_parse("REGISTRY_SHARDS") {
            self.registry.shards = shards;
        }

        // 运行时
        if let Some(path) = env_var("NATIVE_LIBRARY") {
            self.runtime.native_library = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(auto_setup) = env_parse("AUTO_SETUP") {
            self.runtime.auto_setup = auto_setup;
        }

        // 日志
        if let Some(level) = env_parse("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(log_to_console) = env_parse("LOG_TO_CONSOLE") {
            self.logging.log_to_console = log_to_console;
        }

        // 应用
        if let Some(name) = env_var("APP_NAME") {
            self.application.name = name;
        }
        if let Some(headless) = env_parse("HEADLESS") {
            self.application.headless = headless;
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.registry.validate()?;
        self.runtime.validate()?;
        self.application.validate()?;
        Ok(())
    }

    /// 用户配置目录下的配置文件路径
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(CONFIG_FILE_STEM)
                .join(format!("{CONFIG_FILE_STEM}.toml"))
        })
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./engine_interop.toml
    /// 2. ./engine_interop.json
    /// 3. <用户配置目录>/engine_interop/engine_interop.toml
    /// 4. 使用默认配置
    ///
    /// 找到的配置随后应用环境变量覆盖。
    pub fn load_or_default() -> Self {
        let mut config = Self::discover().unwrap_or_else(|| {
            tracing::info!(target: "interop", "Using default configuration");
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn discover() -> Option<Self> {
        let toml_path = PathBuf::from(format!("{CONFIG_FILE_STEM}.toml"));
        let json_path = PathBuf::from(format!("{CONFIG_FILE_STEM}.json"));

        let candidates = [Some(toml_path), Some(json_path), Self::user_config_path()];
        for path in candidates.into_iter().flatten() {
            if !path.is_file() {
                continue;
            }
            let loaded = if path.extension().is_some_and(|ext| ext == "json") {
                Self::from_json_file(&path)
            } else {
                Self::from_toml_file(&path)
            };
            match loaded {
                Ok(config) => {
                    tracing::info!(target: "interop", "Loaded config from {}", path.display());
                    return Some(config);
                }
                Err(e) => {
                    tracing::warn!(target: "interop", "Ignoring config {}: {}", path.display(), e);
                }
            }
        }
        None
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|val| val.trim().parse().ok())
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 优先）
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

use crate::impl_default;

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// `EnvFilter` 指令形式
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::ParseError(format!("unknown log level `{other}`"))),
        }
    }
}
