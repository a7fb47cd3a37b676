/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖以及日志初始化
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod buffer;
pub mod packing;

pub use buffer::BufferConfig;
pub use packing::PackingConfig;

use crate::impl_default;
use crate::render::particles::DynamicProperties;

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

/// 粒子子系统主配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// 缓冲区容量配置
    #[serde(default)]
    pub buffer: BufferConfig,

    /// 打包函数配置
    #[serde(default)]
    pub packing: PackingConfig,

    /// 每帧重新打包的属性
    #[serde(default)]
    pub dynamic_properties: DynamicProperties,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ParticleConfig {
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
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PARTICLES_INITIAL_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.buffer.initial_capacity = capacity;
            }
        }
        if let Ok(val) = env::var("PARTICLES_MIN_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.buffer.min_capacity = capacity;
            }
        }
        if let Ok(val) = env::var("PARTICLES_ALLOW_SYNTHESIS") {
            self.packing.allow_synthesis = val.parse().unwrap_or(self.packing.allow_synthesis);
        }
        if let Ok(val) = env::var("PARTICLES_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.buffer.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./particles.toml
    /// 2. ./particles.json
    /// 3. ~/.config/quad_particles/particles.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("particles.toml") {
            tracing::info!(target: "config", "Loaded config from particles.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("particles.json") {
            tracing::info!(target: "config", "Loaded config from particles.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("quad_particles")
                .join("particles.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default configuration");
        Self::default()
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

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
    /// 解析级别名称（不区分大小写）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// EnvFilter 指令
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量优先于配置中的级别。重复调用无副作用。
pub fn init_logging(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_directive()));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParticleConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.packing.allow_synthesis);
        assert!(config.dynamic_properties.position);
        assert!(!config.dynamic_properties.color);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ParticleConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ParticleConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ParticleConfig::from_toml_str(
            r#"
            [buffer]
            min_capacity = 5

            [dynamic_properties]
            rotation = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.buffer.min_capacity, 5);
        assert_eq!(parsed.buffer.initial_capacity, 1000);
        assert!(parsed.dynamic_properties.rotation);
        assert!(parsed.dynamic_properties.position);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("particles.json");

        let mut config = ParticleConfig::default();
        config.packing.allow_synthesis = false;
        config.save_json(&path).unwrap();

        let loaded = ParticleConfig::from_json_file(&path).unwrap();
        assert!(!loaded.packing.allow_synthesis);
    }

    #[test]
    fn test_parse_error() {
        let result = ParticleConfig::from_toml_str("buffer = 3");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_checks_buffer_group() {
        let mut config = ParticleConfig::default();
        config.packing.allow_synthesis = false;
        assert!(config.validate().is_ok());

        config.buffer.shrink_threshold = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
