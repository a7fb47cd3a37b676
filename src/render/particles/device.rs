//! 设备缓冲区与几何绑定
//!
//! - `DeviceBuffer`: 接收 `(字节, 使用长度, 尺寸是否变化)` 的上传接口
//! - `HostBuffer`: CPU 端镜像，统计上传次数（无 GPU 环境与测试使用）
//! - `WgpuBuffer`: wgpu 实现，尺寸变化时重建 `wgpu::Buffer`
//! - `ParticleGeometry`: 属性名到缓冲区字节区间的绑定

use std::sync::Arc;

use super::indices::QuadIndices;
use super::schema::{AttributeFormat, ParticleAttribute, ParticleLayout, PartitionLayout};

/// 设备缓冲区
pub trait DeviceBuffer {
    /// 上传数据
    ///
    /// `data` 为整个已分配区域，只需上传前 `byte_length` 字节。
    /// `size_changed` 为 `true` 时已分配区域的大小发生了变化。
    fn upload(&mut self, data: &[u8], byte_length: usize, size_changed: bool);

    /// 释放设备资源
    fn destroy(&mut self) {}
}

/// CPU 端缓冲区镜像
#[derive(Debug, Clone, Default)]
pub struct HostBuffer {
    /// 最近一次上传的字节
    data: Vec<u8>,
    /// 设备端分配大小
    allocated: usize,
    upload_count: u64,
    allocation_count: u64,
    destroyed: bool,
}

impl HostBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 最近一次上传的字节
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 按 `f32` 读取最近上传的数据
    pub fn f32_at(&self, word: usize) -> f32 {
        f32::from_bits(self.u32_at(word))
    }

    /// 按 `u32` 读取最近上传的数据
    pub fn u32_at(&self, word: usize) -> u32 {
        let start = word * 4;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[start..start + 4]);
        u32::from_ne_bytes(bytes)
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn upload_count(&self) -> u64 {
        self.upload_count
    }

    pub fn allocation_count(&self) -> u64 {
        self.allocation_count
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl DeviceBuffer for HostBuffer {
    fn upload(&mut self, data: &[u8], byte_length: usize, size_changed: bool) {
        if size_changed || self.allocated < data.len() {
            self.allocated = data.len();
            self.allocation_count += 1;
        }
        self.data.clear();
        self.data.extend_from_slice(&data[..byte_length]);
        self.upload_count += 1;
    }

    fn destroy(&mut self) {
        self.data = Vec::new();
        self.allocated = 0;
        self.destroyed = true;
    }
}

/// wgpu 缓冲区
pub struct WgpuBuffer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: Option<wgpu::Buffer>,
}

impl WgpuBuffer {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        label: &'static str,
        usage: wgpu::BufferUsages,
    ) -> Self {
        Self {
            device,
            queue,
            label,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            buffer: None,
        }
    }

    /// 顶点缓冲区
    pub fn vertex(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, label: &'static str) -> Self {
        Self::new(device, queue, label, wgpu::BufferUsages::VERTEX)
    }

    /// 索引缓冲区
    pub fn index(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, label: &'static str) -> Self {
        Self::new(device, queue, label, wgpu::BufferUsages::INDEX)
    }

    /// 当前的 wgpu 缓冲区
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}

impl DeviceBuffer for WgpuBuffer {
    fn upload(&mut self, data: &[u8], byte_length: usize, size_changed: bool) {
        let size = data.len() as wgpu::BufferAddress;
        let needs_allocation =
            size_changed || self.buffer.as_ref().map_or(true, |buffer| buffer.size() < size);

        if needs_allocation {
            if let Some(old) = self.buffer.take() {
                old.destroy();
            }
            self.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size,
                usage: self.usage,
                mapped_at_creation: false,
            }));
        }

        if byte_length == 0 {
            return;
        }

        if let Some(buffer) = &self.buffer {
            self.queue.write_buffer(buffer, 0, &data[..byte_length]);
        }
    }

    fn destroy(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
        }
    }
}

/// 粒子缓冲区的三个设备缓冲区
pub struct DeviceBuffers<B: DeviceBuffer> {
    pub static_buffer: B,
    pub dynamic_buffer: B,
    pub index_buffer: B,
}

impl DeviceBuffers<HostBuffer> {
    /// CPU 端镜像
    pub fn host() -> Self {
        Self {
            static_buffer: HostBuffer::new(),
            dynamic_buffer: HostBuffer::new(),
            index_buffer: HostBuffer::new(),
        }
    }
}

impl DeviceBuffers<WgpuBuffer> {
    pub fn wgpu(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            static_buffer: WgpuBuffer::vertex(
                device.clone(),
                queue.clone(),
                "Particle Static Buffer",
            ),
            dynamic_buffer: WgpuBuffer::vertex(
                device.clone(),
                queue.clone(),
                "Particle Dynamic Buffer",
            ),
            index_buffer: WgpuBuffer::index(device, queue, "Particle Index Buffer"),
        }
    }
}

/// 属性所在的缓冲区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    Static,
    Dynamic,
}

/// 单个属性绑定
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBinding {
    /// 着色器属性名
    pub name: &'static str,
    pub attribute: ParticleAttribute,
    pub buffer: BufferSlot,
    pub stride_bytes: usize,
    pub offset_bytes: usize,
    pub format: AttributeFormat,
}

/// 粒子几何
///
/// 每次容量变化时重建；步长与偏移在缓冲区生命周期内不变。
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGeometry {
    attributes: Vec<AttributeBinding>,
    index_format: wgpu::IndexFormat,
    capacity: usize,
}

impl ParticleGeometry {
    pub fn new(layout: &ParticleLayout, indices: &QuadIndices, capacity: usize) -> Self {
        let mut attributes = Vec::with_capacity(ParticleAttribute::ALL.len());
        for attribute in ParticleAttribute::ALL {
            let (slot, partition) = if layout.properties().is_dynamic(attribute) {
                (BufferSlot::Dynamic, layout.dynamic_layout())
            } else {
                (BufferSlot::Static, layout.static_layout())
            };
            if let Some(binding) = Self::binding(attribute, slot, partition) {
                attributes.push(binding);
            }
        }

        Self {
            attributes,
            index_format: indices.format(),
            capacity,
        }
    }

    fn binding(
        attribute: ParticleAttribute,
        slot: BufferSlot,
        partition: &PartitionLayout,
    ) -> Option<AttributeBinding> {
        let offset = partition.offset_of(attribute)?;
        Some(AttributeBinding {
            name: attribute.shader_name(),
            attribute,
            buffer: slot,
            stride_bytes: partition.stride_bytes(),
            offset_bytes: offset * 4,
            format: attribute.format(),
        })
    }

    pub fn attributes(&self) -> &[AttributeBinding] {
        &self.attributes
    }

    /// 按着色器属性名查找
    pub fn attribute(&self, name: &str) -> Option<&AttributeBinding> {
        self.attributes.iter().find(|binding| binding.name == name)
    }

    pub fn index_format(&self) -> wgpu::IndexFormat {
        self.index_format
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 指定缓冲区的 wgpu 顶点属性（`shader_location` 为模式序号）
    pub fn vertex_attributes(&self, slot: BufferSlot) -> Vec<wgpu::VertexAttribute> {
        self.attributes
            .iter()
            .filter(|binding| binding.buffer == slot)
            .map(|binding| wgpu::VertexAttribute {
                format: binding.format.to_wgpu(),
                offset: binding.offset_bytes as wgpu::BufferAddress,
                shader_location: binding.attribute.index() as u32,
            })
            .collect()
    }

    /// 指定缓冲区的步长（字节），缓冲区为空时返回 0
    pub fn stride_bytes(&self, slot: BufferSlot) -> usize {
        self.attributes
            .iter()
            .find(|binding| binding.buffer == slot)
            .map_or(0, |binding| binding.stride_bytes)
    }
}
