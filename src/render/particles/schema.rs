//! 粒子属性模式
//!
//! 固定顺序的属性表（顶点偏移、位置、旋转、UV、颜色），整个子系统共享。
//! 每个属性描述符包含：
//! - 二进制格式
//! - 打包规则：对单个粒子写入四个角的值
//! - 可变性：动态（每帧重新打包）或静态（仅在显式失效时重新打包）
//!
//! 描述符集合按可变性划分为两个分区，每个分区独立计算步长与偏移。
//! 步长与偏移在布局创建时计算一次，此后不再改变；
//! 修改动态属性集合需要重建缓冲区。

use serde::{Deserialize, Serialize};

use super::particle::Particle;
use super::view::ViewableBuffer;
use crate::impl_default;

/// 属性二进制格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    /// 4 个 8 位归一化分量，占用一个 32 位字
    Unorm8x4,
}

impl AttributeFormat {
    /// 每个顶点占用的 32 位字数
    pub const fn word_count(&self) -> usize {
        match self {
            Self::Float32 | Self::Uint32 | Self::Unorm8x4 => 1,
            Self::Float32x2 => 2,
            Self::Float32x3 => 3,
            Self::Float32x4 => 4,
        }
    }

    /// 每个顶点占用的字节数
    pub const fn byte_size(&self) -> usize {
        self.word_count() * 4
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float32x2 => "float32x2",
            Self::Float32x3 => "float32x3",
            Self::Float32x4 => "float32x4",
            Self::Uint32 => "uint32",
            Self::Unorm8x4 => "unorm8x4",
        }
    }

    pub fn to_wgpu(&self) -> wgpu::VertexFormat {
        match self {
            Self::Float32 => wgpu::VertexFormat::Float32,
            Self::Float32x2 => wgpu::VertexFormat::Float32x2,
            Self::Float32x3 => wgpu::VertexFormat::Float32x3,
            Self::Float32x4 => wgpu::VertexFormat::Float32x4,
            Self::Uint32 => wgpu::VertexFormat::Uint32,
            Self::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        }
    }
}

/// 属性数量
pub const ATTRIBUTE_COUNT: usize = 5;

/// 每个粒子的顶点数
pub const VERTICES_PER_PARTICLE: usize = 4;

/// 粒子属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ParticleAttribute {
    /// 四角相对位置（由纹理帧、锚点、缩放计算）
    Vertex = 0,
    /// 世界坐标
    Position = 1,
    /// 旋转
    Rotation = 2,
    /// 纹理坐标
    Uvs = 3,
    /// 打包颜色
    Color = 4,
}

impl ParticleAttribute {
    /// 模式顺序
    pub const ALL: [ParticleAttribute; ATTRIBUTE_COUNT] = [
        Self::Vertex,
        Self::Position,
        Self::Rotation,
        Self::Uvs,
        Self::Color,
    ];

    /// 在模式中的序号（同时作为着色器 location）
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// 位掩码
    #[inline]
    pub const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Position => "position",
            Self::Rotation => "rotation",
            Self::Uvs => "uvs",
            Self::Color => "color",
        }
    }

    /// 着色器中的属性名
    pub fn shader_name(&self) -> &'static str {
        match self {
            Self::Vertex => "aVertex",
            Self::Position => "aPosition",
            Self::Rotation => "aRotation",
            Self::Uvs => "aUV",
            Self::Color => "aColor",
        }
    }

    pub fn format(&self) -> AttributeFormat {
        match self {
            Self::Vertex | Self::Position | Self::Uvs => AttributeFormat::Float32x2,
            Self::Rotation => AttributeFormat::Float32,
            Self::Color => AttributeFormat::Unorm8x4,
        }
    }

    /// 打包规则
    pub fn rule(&self) -> PackRule {
        match self {
            Self::Vertex => rules::pack_vertex,
            Self::Position => rules::pack_position,
            Self::Rotation => rules::pack_rotation,
            Self::Uvs => rules::pack_uvs,
            Self::Color => rules::pack_color,
        }
    }
}

/// 纹理缺少帧数据，无法计算四角
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingFrame;

/// 单粒子打包规则
///
/// 参数为粒子、目标数据区、该属性在当前粒子第一个顶点上的字偏移、
/// 以及分区步长（字）。四个角依次位于 `offset + k * stride`。
pub type PackRule = fn(&Particle, &mut ViewableBuffer, usize, usize) -> Result<(), MissingFrame>;

/// 动态属性集合
///
/// 默认只有位置是动态的。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicProperties {
    pub vertex: bool,
    pub position: bool,
    pub rotation: bool,
    pub uvs: bool,
    pub color: bool,
}

impl_default!(DynamicProperties {
    vertex: false,
    position: true,
    rotation: false,
    uvs: false,
    color: false,
});

impl DynamicProperties {
    /// 全部静态
    pub fn none() -> Self {
        Self {
            vertex: false,
            position: false,
            rotation: false,
            uvs: false,
            color: false,
        }
    }

    /// 全部动态
    pub fn all() -> Self {
        Self {
            vertex: true,
            position: true,
            rotation: true,
            uvs: true,
            color: true,
        }
    }

    pub fn is_dynamic(&self, attribute: ParticleAttribute) -> bool {
        match attribute {
            ParticleAttribute::Vertex => self.vertex,
            ParticleAttribute::Position => self.position,
            ParticleAttribute::Rotation => self.rotation,
            ParticleAttribute::Uvs => self.uvs,
            ParticleAttribute::Color => self.color,
        }
    }

    pub fn set(&mut self, attribute: ParticleAttribute, dynamic: bool) {
        match attribute {
            ParticleAttribute::Vertex => self.vertex = dynamic,
            ParticleAttribute::Position => self.position = dynamic,
            ParticleAttribute::Rotation => self.rotation = dynamic,
            ParticleAttribute::Uvs => self.uvs = dynamic,
            ParticleAttribute::Color => self.color = dynamic,
        }
    }

    /// 从位掩码构造（`ParticleAttribute::bit`）
    pub fn from_mask(mask: u8) -> Self {
        let mut properties = Self::none();
        for attribute in ParticleAttribute::ALL {
            properties.set(attribute, mask & attribute.bit() != 0);
        }
        properties
    }

    /// 动态属性位掩码
    pub fn mask(&self) -> u8 {
        ParticleAttribute::ALL
            .iter()
            .filter(|a| self.is_dynamic(**a))
            .fold(0, |mask, a| mask | a.bit())
    }
}

/// 属性描述符
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
    pub attribute: ParticleAttribute,
    pub format: AttributeFormat,
    pub dynamic: bool,
}

impl PropertyDescriptor {
    pub fn new(attribute: ParticleAttribute, dynamic: bool) -> Self {
        Self {
            attribute,
            format: attribute.format(),
            dynamic,
        }
    }

    pub fn name(&self) -> &'static str {
        self.attribute.name()
    }

    pub fn rule(&self) -> PackRule {
        self.attribute.rule()
    }
}

/// 按模式顺序生成描述符
pub fn particle_schema(properties: &DynamicProperties) -> Vec<PropertyDescriptor> {
    ParticleAttribute::ALL
        .iter()
        .map(|&attribute| PropertyDescriptor::new(attribute, properties.is_dynamic(attribute)))
        .collect()
}

/// 单个分区的布局
#[derive(Debug, Clone)]
pub struct PartitionLayout {
    descriptors: Vec<PropertyDescriptor>,
    /// 每个属性在顶点内的字偏移；不在分区内的属性为 `None`
    offsets: [Option<usize>; ATTRIBUTE_COUNT],
    stride: usize,
    mask: u8,
}

impl PartitionLayout {
    /// 按给定顺序累加偏移；重复的属性只保留第一个
    pub fn new(descriptors: impl IntoIterator<Item = PropertyDescriptor>) -> Self {
        let mut layout = Self {
            descriptors: Vec::new(),
            offsets: [None; ATTRIBUTE_COUNT],
            stride: 0,
            mask: 0,
        };

        for descriptor in descriptors {
            let attribute = descriptor.attribute;
            if layout.mask & attribute.bit() != 0 {
                continue;
            }
            layout.offsets[attribute.index()] = Some(layout.stride);
            layout.stride += descriptor.format.word_count();
            layout.mask |= attribute.bit();
            layout.descriptors.push(descriptor);
        }

        layout
    }

    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    /// 步长（字）
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 步长（字节）
    #[inline]
    pub fn stride_bytes(&self) -> usize {
        self.stride * 4
    }

    /// 属性字偏移
    #[inline]
    pub fn offset_of(&self, attribute: ParticleAttribute) -> Option<usize> {
        self.offsets[attribute.index()]
    }

    /// 分区包含的属性位掩码
    #[inline]
    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// `capacity` 个粒子需要的字数
    pub fn words_for(&self, capacity: usize) -> usize {
        capacity * VERTICES_PER_PARTICLE * self.stride
    }

    /// `count` 个粒子实际使用的字节数
    pub fn used_bytes(&self, count: usize) -> usize {
        count * VERTICES_PER_PARTICLE * self.stride_bytes()
    }
}

/// 完整布局：动态分区 + 静态分区
#[derive(Debug, Clone)]
pub struct ParticleLayout {
    properties: DynamicProperties,
    dynamic_layout: PartitionLayout,
    static_layout: PartitionLayout,
}

impl ParticleLayout {
    pub fn new(properties: DynamicProperties) -> Self {
        let descriptors = particle_schema(&properties);
        Self::from_descriptors(properties, &descriptors)
    }

    fn from_descriptors(properties: DynamicProperties, descriptors: &[PropertyDescriptor]) -> Self {
        Self {
            properties,
            dynamic_layout: PartitionLayout::new(descriptors.iter().copied().filter(|d| d.dynamic)),
            static_layout: PartitionLayout::new(descriptors.iter().copied().filter(|d| !d.dynamic)),
        }
    }

    pub fn properties(&self) -> &DynamicProperties {
        &self.properties
    }

    pub fn dynamic_layout(&self) -> &PartitionLayout {
        &self.dynamic_layout
    }

    pub fn static_layout(&self) -> &PartitionLayout {
        &self.static_layout
    }

    /// 属性所在分区
    pub fn partition_of(&self, attribute: ParticleAttribute) -> &PartitionLayout {
        if self.properties.is_dynamic(attribute) {
            &self.dynamic_layout
        } else {
            &self.static_layout
        }
    }
}

/// 各属性的单粒子打包规则
pub mod rules {
    use super::{MissingFrame, Particle, ViewableBuffer};

    /// 四角相对位置
    ///
    /// 与精灵从纹理帧和锚点推导本地包围四边形的方式一致：
    /// 有裁剪时以裁剪矩形为准，否则使用原始矩形。
    #[inline]
    pub fn pack_vertex(
        particle: &Particle,
        view: &mut ViewableBuffer,
        offset: usize,
        stride: usize,
    ) -> Result<(), MissingFrame> {
        let texture = &particle.texture;
        let orig = texture.orig().ok_or(MissingFrame)?;

        let (w0, w1, h0, h1) = match texture.trim() {
            Some(trim) => {
                let w1 = trim.x - particle.anchor_x * orig.width;
                let h1 = trim.y - particle.anchor_y * orig.height;
                (w1 + trim.width, w1, h1 + trim.height, h1)
            }
            None => {
                let w1 = -particle.anchor_x * orig.width;
                let h1 = -particle.anchor_y * orig.height;
                (w1 + orig.width, w1, h1 + orig.height, h1)
            }
        };

        let sx = particle.scale_x;
        let sy = particle.scale_y;

        view.set_f32(offset, w1 * sx);
        view.set_f32(offset + 1, h1 * sy);

        view.set_f32(offset + stride, w0 * sx);
        view.set_f32(offset + stride + 1, h1 * sy);

        view.set_f32(offset + stride * 2, w0 * sx);
        view.set_f32(offset + stride * 2 + 1, h0 * sy);

        view.set_f32(offset + stride * 3, w1 * sx);
        view.set_f32(offset + stride * 3 + 1, h0 * sy);

        Ok(())
    }

    #[inline]
    pub fn pack_position(
        particle: &Particle,
        view: &mut ViewableBuffer,
        offset: usize,
        stride: usize,
    ) -> Result<(), MissingFrame> {
        for corner in 0..4 {
            let at = offset + stride * corner;
            view.set_f32(at, particle.x);
            view.set_f32(at + 1, particle.y);
        }
        Ok(())
    }

    #[inline]
    pub fn pack_rotation(
        particle: &Particle,
        view: &mut ViewableBuffer,
        offset: usize,
        stride: usize,
    ) -> Result<(), MissingFrame> {
        for corner in 0..4 {
            view.set_f32(offset + stride * corner, particle.rotation);
        }
        Ok(())
    }

    #[inline]
    pub fn pack_uvs(
        particle: &Particle,
        view: &mut ViewableBuffer,
        offset: usize,
        stride: usize,
    ) -> Result<(), MissingFrame> {
        let uvs = particle.texture.uvs();

        view.set_f32(offset, uvs.x0);
        view.set_f32(offset + 1, uvs.y0);

        view.set_f32(offset + stride, uvs.x1);
        view.set_f32(offset + stride + 1, uvs.y1);

        view.set_f32(offset + stride * 2, uvs.x2);
        view.set_f32(offset + stride * 2 + 1, uvs.y2);

        view.set_f32(offset + stride * 3, uvs.x3);
        view.set_f32(offset + stride * 3 + 1, uvs.y3);

        Ok(())
    }

    #[inline]
    pub fn pack_color(
        particle: &Particle,
        view: &mut ViewableBuffer,
        offset: usize,
        stride: usize,
    ) -> Result<(), MissingFrame> {
        for corner in 0..4 {
            view.set_u32(offset + stride * corner, particle.color);
        }
        Ok(())
    }
}
