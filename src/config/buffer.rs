use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 粒子缓冲区容量配置
///
/// 增长与收缩系数只是调优常量；真正的不变量是容量下限
/// (`min_capacity`) 以及"容量总能容纳当前全部粒子"。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 初始容量（粒子数）
    pub initial_capacity: usize,

    /// 最小容量，收缩时不会低于此值
    pub min_capacity: usize,

    /// 增长系数
    pub growth_factor: f32,

    /// 收缩阈值：容量超过 `shrink_threshold × 粒子数` 时收缩
    pub shrink_threshold: f32,

    /// 收缩后的余量系数
    pub shrink_factor: f32,
}

impl_default!(BufferConfig {
    initial_capacity: 1000,
    min_capacity: 16,
    growth_factor: 1.5,
    shrink_threshold: 3.0,
    shrink_factor: 1.5,
});

impl BufferConfig {
    /// 使用指定的初始容量与下限创建
    pub fn with_capacity(initial_capacity: usize, min_capacity: usize) -> Self {
        Self {
            initial_capacity,
            min_capacity,
            ..Default::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "min_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.growth_factor > 1.0) {
            return Err(ConfigError::ValidationError(
                "growth_factor must be greater than 1".to_string(),
            ));
        }
        if !(self.shrink_factor >= 1.0) {
            return Err(ConfigError::ValidationError(
                "shrink_factor must be at least 1".to_string(),
            ));
        }
        // 收缩后的容量不能立即再次满足收缩条件
        if !(self.shrink_threshold > self.shrink_factor) {
            return Err(ConfigError::ValidationError(
                "shrink_threshold must be greater than shrink_factor".to_string(),
            ));
        }
        Ok(())
    }

    /// 实际使用的初始容量（不低于下限）
    pub fn effective_initial_capacity(&self) -> usize {
        self.initial_capacity.max(self.min_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BufferConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_missing_hysteresis() {
        let config = BufferConfig {
            shrink_threshold: 1.2,
            shrink_factor: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_floor() {
        let config = BufferConfig::with_capacity(10, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_initial_capacity_respects_floor() {
        let config = BufferConfig::with_capacity(2, 5);
        assert_eq!(config.effective_initial_capacity(), 5);
    }
}
