//! 打包函数合成
//!
//! 对一个属性分区生成单循环打包函数：外层遍历粒子，内层按属性内联写入，
//! 步长与偏移只计算一次，避免每粒子每属性一次间接调用与偏移重算。
//!
//! ## 实现方式
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  pack_fused::<MASK>   (MASK = 分区属性位掩码, 0..32)        │
//! │    for particle in particles:                              │
//! │        if MASK & VERTEX   { pack_vertex(..) }   // 编译期裁剪 │
//! │        if MASK & POSITION { pack_position(..) }            │
//! │        ...                                                 │
//! │        base += stride * 4                                  │
//! ├──────────────────────────────────────────────────────────┤
//! │  SPECIALIZATIONS[32]  编译期生成的特化表                    │
//! │  synthesize()         按分区掩码查表                        │
//! │  PackerCache          以描述符内容哈希缓存结果               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! 禁止使用特化函数时（`PackingStrategy::Precompiled`），
//! 使用 [`fallback`](super::fallback) 的逐属性写入表组合出等价的打包函数。

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use super::fallback;
use super::particle::Particle;
use super::schema::{
    rules, MissingFrame, ParticleAttribute, PartitionLayout, PropertyDescriptor, ATTRIBUTE_COUNT,
    VERTICES_PER_PARTICLE,
};
use super::view::ViewableBuffer;
use crate::config::PackingConfig;
use crate::core::{ParticleError, ParticleResult};

/// 分区打包函数
pub type PackFn = fn(&[Particle], &mut ViewableBuffer, &PartitionLayout) -> ParticleResult<()>;

/// 打包策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackingStrategy {
    /// 特化的单循环打包函数
    Synthesized,
    /// 逐属性预编译写入表
    Precompiled,
}

impl PackingStrategy {
    /// 根据环境能力选择策略
    pub fn from_config(config: &PackingConfig) -> Self {
        if config.allow_synthesis {
            Self::Synthesized
        } else {
            tracing::warn!(
                target: "particles",
                "Packing function synthesis disabled, using precompiled writers"
            );
            Self::Precompiled
        }
    }
}

const VERTEX: u8 = ParticleAttribute::Vertex.bit();
const POSITION: u8 = ParticleAttribute::Position.bit();
const ROTATION: u8 = ParticleAttribute::Rotation.bit();
const UVS: u8 = ParticleAttribute::Uvs.bit();
const COLOR: u8 = ParticleAttribute::Color.bit();

/// 融合打包循环
///
/// `MASK` 中未包含的属性分支在编译期被消除。
fn pack_fused<const MASK: u8>(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    layout: &PartitionLayout,
) -> ParticleResult<()> {
    let stride = layout.stride();
    let offset = |attribute: ParticleAttribute| layout.offset_of(attribute).unwrap_or(0);
    let vertex = offset(ParticleAttribute::Vertex);
    let position = offset(ParticleAttribute::Position);
    let rotation = offset(ParticleAttribute::Rotation);
    let uvs = offset(ParticleAttribute::Uvs);
    let color = offset(ParticleAttribute::Color);

    let mut base = 0;
    for (index, particle) in particles.iter().enumerate() {
        let missing = |_: MissingFrame| ParticleError::MissingFrame { index };

        if MASK & VERTEX != 0 {
            rules::pack_vertex(particle, view, base + vertex, stride).map_err(missing)?;
        }
        if MASK & POSITION != 0 {
            rules::pack_position(particle, view, base + position, stride).map_err(missing)?;
        }
        if MASK & ROTATION != 0 {
            rules::pack_rotation(particle, view, base + rotation, stride).map_err(missing)?;
        }
        if MASK & UVS != 0 {
            rules::pack_uvs(particle, view, base + uvs, stride).map_err(missing)?;
        }
        if MASK & COLOR != 0 {
            rules::pack_color(particle, view, base + color, stride).map_err(missing)?;
        }
        base += stride * VERTICES_PER_PARTICLE;
    }

    Ok(())
}

macro_rules! specialization_table {
    ($($mask:literal)*) => {
        [$(pack_fused::<$mask> as PackFn),*]
    };
}

/// 每个属性子集一个特化函数
static SPECIALIZATIONS: [PackFn; 1 << ATTRIBUTE_COUNT] = specialization_table!(
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
);

/// 绑定到分区布局的打包函数
#[derive(Clone)]
pub struct Packer {
    layout: Arc<PartitionLayout>,
    pack: PackFn,
    strategy: PackingStrategy,
}

impl std::fmt::Debug for Packer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packer")
            .field("strategy", &self.strategy)
            .field("mask", &self.layout.mask())
            .field("stride", &self.layout.stride())
            .finish()
    }
}

impl Packer {
    fn new(layout: PartitionLayout, strategy: PackingStrategy) -> Self {
        let pack = match strategy {
            PackingStrategy::Synthesized => SPECIALIZATIONS[layout.mask() as usize],
            PackingStrategy::Precompiled => fallback::pack_precompiled as PackFn,
        };

        Self {
            layout: Arc::new(layout),
            pack,
            strategy,
        }
    }

    /// 打包全部粒子
    ///
    /// `view` 必须至少容纳 `particles.len()` 个粒子。
    pub fn pack(&self, particles: &[Particle], view: &mut ViewableBuffer) -> ParticleResult<()> {
        (self.pack)(particles, view, &self.layout)
    }

    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    pub fn strategy(&self) -> PackingStrategy {
        self.strategy
    }
}

/// 动态/静态打包函数对
#[derive(Debug, Clone)]
pub struct PackerPair {
    pub dynamic_packer: Packer,
    pub static_packer: Packer,
}

fn partition(descriptors: &[PropertyDescriptor], dynamic: bool) -> PartitionLayout {
    PartitionLayout::new(descriptors.iter().copied().filter(|d| d.dynamic == dynamic))
}

/// 按可变性划分描述符并生成两个融合打包函数
pub fn synthesize(descriptors: &[PropertyDescriptor]) -> PackerPair {
    build_packers(descriptors, PackingStrategy::Synthesized)
}

/// 用预编译写入表组合出等价的打包函数对
pub fn compose_precompiled(descriptors: &[PropertyDescriptor]) -> PackerPair {
    build_packers(descriptors, PackingStrategy::Precompiled)
}

/// 按策略生成打包函数对
pub fn build_packers(descriptors: &[PropertyDescriptor], strategy: PackingStrategy) -> PackerPair {
    let pair = PackerPair {
        dynamic_packer: Packer::new(partition(descriptors, true), strategy),
        static_packer: Packer::new(partition(descriptors, false), strategy),
    };

    tracing::debug!(
        target: "particles",
        "Built {:?} packers: dynamic mask {:#07b} stride {}, static mask {:#07b} stride {}",
        strategy,
        pair.dynamic_packer.layout().mask(),
        pair.dynamic_packer.layout().stride(),
        pair.static_packer.layout().mask(),
        pair.static_packer.layout().stride(),
    );

    pair
}

/// 打包函数缓存统计
#[derive(Debug, Clone, Default)]
pub struct PackerCacheStats {
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
}

impl PackerCacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// 打包函数缓存
///
/// 以描述符内容（名称 + 格式 + 可变性）和策略的 SHA256 为键。
/// 相同的描述符子集总是生成行为一致的函数，因此可以共享。
#[derive(Debug, Default)]
pub struct PackerCache {
    entries: HashMap<String, PackerPair>,
    stats: PackerCacheStats,
}

impl PackerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 计算缓存键
    pub fn cache_key(descriptors: &[PropertyDescriptor], strategy: PackingStrategy) -> String {
        let mut hasher = Sha256::new();
        for descriptor in descriptors {
            hasher.update(descriptor.name().as_bytes());
            hasher.update(b":");
            hasher.update(descriptor.format.name().as_bytes());
            hasher.update(if descriptor.dynamic { &b":dynamic;"[..] } else { &b":static;"[..] });
        }
        hasher.update(format!("{:?}", strategy).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// 获取或生成打包函数对
    pub fn get_or_build(
        &mut self,
        descriptors: &[PropertyDescriptor],
        strategy: PackingStrategy,
    ) -> PackerPair {
        let key = Self::cache_key(descriptors, strategy);

        if let Some(pair) = self.entries.get(&key) {
            self.stats.hits += 1;
            tracing::trace!(target: "particles", "Packer cache hit {}", &key[..16]);
            return pair.clone();
        }

        self.stats.misses += 1;
        tracing::trace!(target: "particles", "Packer cache miss {}", &key[..16]);
        let pair = build_packers(descriptors, strategy);
        self.entries.insert(key, pair.clone());
        pair
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &PackerCacheStats {
        &self.stats
    }
}
