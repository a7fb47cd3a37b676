//! 统一错误处理模块
//!
//! 提供粒子子系统范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **打包错误** (`ParticleError`): 打包、容量管理、容器操作中的输入契约错误
//! - **配置错误** (`config::ConfigError`): 配置文件读取、解析与验证错误
//!
//! 调用方的编程错误（例如预分配索引缓冲区长度不符）不会以 `Err` 返回，
//! 而是直接 panic。

use thiserror::Error;

use crate::config::ConfigError;

/// 粒子子系统错误类型
#[derive(Error, Debug)]
pub enum ParticleError {
    #[error("Particle {index} references a texture without frame data")]
    MissingFrame { index: usize },

    #[error("Buffer layout does not match the container's dynamic properties")]
    LayoutMismatch,

    #[error("Particle index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid particle range {start}..{end} (len {len})")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// 粒子子系统结果类型别名
pub type ParticleResult<T> = Result<T, ParticleError>;
