//! 粒子容器
//!
//! 持有有序粒子列表（顺序即绘制顺序），记录结构变化，并在渲染时驱动打包。
//!
//! 结构变化（添加、删除、重排、交换）或显式调用 `update()` 会设置脏标记；
//! 下一次 `render()` 以 `force_static = true` 打包一次，然后清除标记。
//! 只修改动态属性（默认只有位置）时无需调用 `update()`。
//!
//! 容器不会自动计算包围盒（代价随粒子数线性增长）；
//! 需要剔除或布局时由调用方通过 `set_bounds_area` 提供。

use std::ops::Range;

use super::buffer::{ParticleBuffer, ParticleBufferOptions};
use super::device::{DeviceBuffer, DeviceBuffers};
use super::particle::{Particle, Rectangle};
use super::schema::DynamicProperties;
use super::synthesize::PackerCache;
use crate::config::ParticleConfig;
use crate::core::{ParticleError, ParticleResult};

/// 粒子容器
#[derive(Debug, Clone)]
pub struct ParticleContainer {
    particles: Vec<Particle>,
    properties: DynamicProperties,
    dirty: bool,
    bounds_area: Option<Rectangle>,
}

impl Default for ParticleContainer {
    fn default() -> Self {
        Self::new(DynamicProperties::default())
    }
}

impl ParticleContainer {
    pub fn new(properties: DynamicProperties) -> Self {
        Self {
            particles: Vec::new(),
            properties,
            dirty: true,
            bounds_area: None,
        }
    }

    pub fn from_config(config: &ParticleConfig) -> Self {
        Self::new(config.dynamic_properties)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    /// 可变访问
    ///
    /// 修改静态属性后需调用 `update()`。
    pub fn particle_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    /// 可变访问全部粒子（不改变结构）
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// 追加粒子
    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
        self.dirty = true;
    }

    /// 追加多个粒子
    pub fn add_particles(&mut self, particles: impl IntoIterator<Item = Particle>) {
        self.particles.extend(particles);
        self.dirty = true;
    }

    /// 在指定位置插入粒子
    pub fn add_particle_at(&mut self, particle: Particle, index: usize) -> ParticleResult<()> {
        let len = self.particles.len();
        if index > len {
            return Err(ParticleError::IndexOutOfBounds { index, len });
        }
        self.particles.insert(index, particle);
        self.dirty = true;
        Ok(())
    }

    /// 删除指定位置的粒子
    pub fn remove_particle_at(&mut self, index: usize) -> ParticleResult<Particle> {
        let len = self.particles.len();
        if index >= len {
            return Err(ParticleError::IndexOutOfBounds { index, len });
        }
        self.dirty = true;
        Ok(self.particles.remove(index))
    }

    /// 删除一段粒子
    pub fn remove_particles(&mut self, range: Range<usize>) -> ParticleResult<Vec<Particle>> {
        let len = self.particles.len();
        if range.start > range.end || range.end > len {
            return Err(ParticleError::InvalidRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
        if range.is_empty() {
            return Ok(Vec::new());
        }
        self.dirty = true;
        Ok(self.particles.drain(range).collect())
    }

    /// 删除全部粒子
    pub fn remove_all(&mut self) -> Vec<Particle> {
        if !self.particles.is_empty() {
            self.dirty = true;
        }
        std::mem::take(&mut self.particles)
    }

    /// 交换两个粒子的绘制顺序
    pub fn swap_particles(&mut self, a: usize, b: usize) -> ParticleResult<()> {
        let len = self.particles.len();
        for index in [a, b] {
            if index >= len {
                return Err(ParticleError::IndexOutOfBounds { index, len });
            }
        }
        if a != b {
            self.particles.swap(a, b);
            self.dirty = true;
        }
        Ok(())
    }

    /// 将粒子移动到新位置
    pub fn set_particle_index(&mut self, from: usize, to: usize) -> ParticleResult<()> {
        let len = self.particles.len();
        for index in [from, to] {
            if index >= len {
                return Err(ParticleError::IndexOutOfBounds { index, len });
            }
        }
        if from != to {
            let particle = self.particles.remove(from);
            self.particles.insert(to, particle);
            self.dirty = true;
        }
        Ok(())
    }

    /// 标记静态属性已修改
    pub fn update(&mut self) {
        self.dirty = true;
    }

    /// 下一次渲染是否需要重新打包静态区
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn dynamic_properties(&self) -> &DynamicProperties {
        &self.properties
    }

    /// 修改动态属性集合
    ///
    /// 已有的缓冲区布局随之失效，需要通过 `create_buffer` 重建。
    pub fn set_dynamic_properties(&mut self, properties: DynamicProperties) {
        if self.properties != properties {
            self.properties = properties;
            self.dirty = true;
        }
    }

    pub fn bounds_area(&self) -> Option<Rectangle> {
        self.bounds_area
    }

    /// 设置外部提供的包围区域
    pub fn set_bounds_area(&mut self, bounds_area: Option<Rectangle>) {
        self.bounds_area = bounds_area;
    }

    /// 创建与本容器布局匹配的缓冲区
    ///
    /// 初始容量不小于当前粒子数。
    pub fn create_buffer<B: DeviceBuffer>(
        &self,
        mut options: ParticleBufferOptions,
        devices: DeviceBuffers<B>,
    ) -> ParticleResult<ParticleBuffer<B>> {
        options.buffer.initial_capacity = options.buffer.initial_capacity.max(self.len());
        ParticleBuffer::new(self.properties, options, devices)
    }

    /// 使用共享缓存创建缓冲区
    pub fn create_buffer_with_cache<B: DeviceBuffer>(
        &self,
        mut options: ParticleBufferOptions,
        devices: DeviceBuffers<B>,
        cache: &mut PackerCache,
    ) -> ParticleResult<ParticleBuffer<B>> {
        options.buffer.initial_capacity = options.buffer.initial_capacity.max(self.len());
        ParticleBuffer::with_cache(self.properties, options, devices, cache)
    }

    /// 执行一次打包
    ///
    /// 脏标记只在打包成功后清除。
    pub fn render<B: DeviceBuffer>(&mut self, buffer: &mut ParticleBuffer<B>) -> ParticleResult<()> {
        if buffer.properties() != &self.properties {
            return Err(ParticleError::LayoutMismatch);
        }

        buffer.update(&self.particles, self.dirty)?;
        self.dirty = false;
        Ok(())
    }
}
