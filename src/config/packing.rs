use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 打包函数选择配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingConfig {
    /// 是否允许使用特化的融合打包函数
    ///
    /// 关闭后使用逐属性的预编译打包表。缓冲区创建时读取一次。
    pub allow_synthesis: bool,
}

impl_default!(PackingConfig {
    allow_synthesis: true,
});
