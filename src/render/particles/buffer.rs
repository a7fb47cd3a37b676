//! 粒子缓冲区管理
//!
//! 持有静态/动态两个顶点数据区、四边形索引缓冲区以及属性绑定。
//!
//! ## 更新流程
//!
//! ```text
//! update(particles, force_static)
//!   ├─ 粒子数 > 容量             → 增长并重新分配（强制上传静态区）
//!   ├─ 容量 > 阈值 × 粒子数 且 容量 > 下限 → 收缩并重新分配
//!   ├─ 打包动态区，只上传实际使用的字节
//!   └─ force_static 或静态区失效 → 打包并上传静态区
//! ```
//!
//! 重新分配总是整体替换数据区、索引与几何绑定，调用方不会观察到部分调整的状态。

use super::device::{DeviceBuffer, DeviceBuffers, ParticleGeometry};
use super::indices::{create_indices_for_quads, QuadIndices};
use super::particle::Particle;
use super::schema::{particle_schema, DynamicProperties, ParticleLayout};
use super::synthesize::{build_packers, PackerCache, PackerPair, PackingStrategy};
use super::view::ViewableBuffer;
use crate::config::{BufferConfig, ParticleConfig};
use crate::core::ParticleResult;

/// 缓冲区创建选项
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBufferOptions {
    pub buffer: BufferConfig,
    pub strategy: PackingStrategy,
}

impl Default for ParticleBufferOptions {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            strategy: PackingStrategy::Synthesized,
        }
    }
}

impl ParticleBufferOptions {
    /// 从配置创建（读取一次环境能力标志）
    pub fn from_config(config: &ParticleConfig) -> Self {
        Self {
            buffer: config.buffer.clone(),
            strategy: PackingStrategy::from_config(&config.packing),
        }
    }

    pub fn with_capacity(mut self, initial_capacity: usize, min_capacity: usize) -> Self {
        self.buffer.initial_capacity = initial_capacity;
        self.buffer.min_capacity = min_capacity;
        self
    }

    pub fn with_strategy(mut self, strategy: PackingStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// 缓冲区统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticleBufferStats {
    /// 动态区打包次数
    pub dynamic_packs: u64,
    /// 静态区打包次数
    pub static_packs: u64,
    /// 重新分配次数（不含创建）
    pub reallocations: u64,
    /// 累计上传字节数
    pub uploaded_bytes: u64,
}

/// 粒子缓冲区
pub struct ParticleBuffer<B: DeviceBuffer> {
    layout: ParticleLayout,
    packers: PackerPair,
    config: BufferConfig,
    capacity: usize,
    static_data: ViewableBuffer,
    dynamic_data: ViewableBuffer,
    indices: QuadIndices,
    geometry: ParticleGeometry,
    devices: DeviceBuffers<B>,
    /// 静态区内容与当前容量匹配且已上传
    static_valid: bool,
    /// 数据区尺寸已变化，下一次上传需通知设备
    size_changed: bool,
    stats: ParticleBufferStats,
}

impl<B: DeviceBuffer> ParticleBuffer<B> {
    /// 创建缓冲区
    pub fn new(
        properties: DynamicProperties,
        options: ParticleBufferOptions,
        devices: DeviceBuffers<B>,
    ) -> ParticleResult<Self> {
        let packers = build_packers(&particle_schema(&properties), options.strategy);
        Self::with_packers(properties, options.buffer, packers, devices)
    }

    /// 使用共享的打包函数缓存创建
    pub fn with_cache(
        properties: DynamicProperties,
        options: ParticleBufferOptions,
        devices: DeviceBuffers<B>,
        cache: &mut PackerCache,
    ) -> ParticleResult<Self> {
        let packers = cache.get_or_build(&particle_schema(&properties), options.strategy);
        Self::with_packers(properties, options.buffer, packers, devices)
    }

    fn with_packers(
        properties: DynamicProperties,
        config: BufferConfig,
        packers: PackerPair,
        devices: DeviceBuffers<B>,
    ) -> ParticleResult<Self> {
        config.validate()?;

        let layout = ParticleLayout::new(properties);
        let capacity = config.effective_initial_capacity();
        let indices = create_indices_for_quads(capacity);
        let geometry = ParticleGeometry::new(&layout, &indices, capacity);

        let mut buffer = Self {
            static_data: ViewableBuffer::new(layout.static_layout().words_for(capacity)),
            dynamic_data: ViewableBuffer::new(layout.dynamic_layout().words_for(capacity)),
            layout,
            packers,
            config,
            capacity,
            indices,
            geometry,
            devices,
            static_valid: false,
            size_changed: true,
            stats: ParticleBufferStats::default(),
        };
        buffer.upload_indices();

        tracing::debug!(
            target: "particles",
            "Created particle buffer: capacity {}, dynamic stride {}B, static stride {}B",
            capacity,
            buffer.layout.dynamic_layout().stride_bytes(),
            buffer.layout.static_layout().stride_bytes(),
        );

        Ok(buffer)
    }

    /// 打包并上传
    ///
    /// 动态区每次都会重新打包；静态区仅在 `force_static`、
    /// 重新分配或尚未写入时重新打包。
    pub fn update(&mut self, particles: &[Particle], force_static: bool) -> ParticleResult<()> {
        let count = particles.len();
        let mut upload_static = force_static || !self.static_valid;

        if let Some(new_capacity) = self.next_capacity(count) {
            self.reallocate(new_capacity);
            upload_static = true;
        }

        let size_changed = self.size_changed;

        let dynamic = self.layout.dynamic_layout();
        if !dynamic.is_empty() {
            self.packers
                .dynamic_packer
                .pack(particles, &mut self.dynamic_data)?;
            let used = dynamic.used_bytes(count);
            self.devices
                .dynamic_buffer
                .upload(self.dynamic_data.as_bytes(), used, size_changed);
            self.stats.dynamic_packs += 1;
            self.stats.uploaded_bytes += used as u64;
        }

        if upload_static {
            let statics = self.layout.static_layout();
            if !statics.is_empty() {
                if let Err(err) = self
                    .packers
                    .static_packer
                    .pack(particles, &mut self.static_data)
                {
                    self.static_valid = false;
                    return Err(err);
                }
                let used = statics.used_bytes(count);
                self.devices
                    .static_buffer
                    .upload(self.static_data.as_bytes(), used, size_changed);
                self.stats.static_packs += 1;
                self.stats.uploaded_bytes += used as u64;
                tracing::trace!(target: "particles", "Repacked static region for {} particles", count);
            }
            self.static_valid = true;
        }

        self.size_changed = false;
        Ok(())
    }

    /// 计算新容量；无需调整时返回 `None`
    fn next_capacity(&self, count: usize) -> Option<usize> {
        let capacity = self.capacity;
        let min_capacity = self.config.min_capacity;

        if count > capacity {
            let grown = (capacity as f64 * self.config.growth_factor as f64) as usize;
            return Some(count.max(grown));
        }

        if capacity > min_capacity
            && capacity as f64 > count as f64 * self.config.shrink_threshold as f64
        {
            let shrunk = (count as f64 * self.config.shrink_factor as f64).ceil() as usize;
            let target = shrunk.max(count).max(min_capacity);
            return (target < capacity).then_some(target);
        }

        None
    }

    fn reallocate(&mut self, capacity: usize) {
        tracing::debug!(
            target: "particles",
            "Reallocating particle buffer: {} -> {}",
            self.capacity,
            capacity
        );

        self.capacity = capacity;
        self.static_data = ViewableBuffer::new(self.layout.static_layout().words_for(capacity));
        self.dynamic_data = ViewableBuffer::new(self.layout.dynamic_layout().words_for(capacity));
        self.indices = create_indices_for_quads(capacity);
        self.geometry = ParticleGeometry::new(&self.layout, &self.indices, capacity);
        self.static_valid = false;
        self.size_changed = true;
        self.stats.reallocations += 1;

        self.upload_indices();
    }

    fn upload_indices(&mut self) {
        let bytes = self.indices.as_bytes();
        self.devices.index_buffer.upload(bytes, bytes.len(), true);
        self.stats.uploaded_bytes += bytes.len() as u64;
    }

    /// 当前容量（粒子数）
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_capacity(&self) -> usize {
        self.config.min_capacity
    }

    /// 本缓冲区使用的动态属性集合
    pub fn properties(&self) -> &DynamicProperties {
        self.layout.properties()
    }

    pub fn layout(&self) -> &ParticleLayout {
        &self.layout
    }

    pub fn geometry(&self) -> &ParticleGeometry {
        &self.geometry
    }

    pub fn indices(&self) -> &QuadIndices {
        &self.indices
    }

    pub fn static_data(&self) -> &ViewableBuffer {
        &self.static_data
    }

    pub fn dynamic_data(&self) -> &ViewableBuffer {
        &self.dynamic_data
    }

    pub fn devices(&self) -> &DeviceBuffers<B> {
        &self.devices
    }

    pub fn strategy(&self) -> PackingStrategy {
        self.packers.dynamic_packer.strategy()
    }

    pub fn stats(&self) -> &ParticleBufferStats {
        &self.stats
    }
}

impl<B: DeviceBuffer> Drop for ParticleBuffer<B> {
    fn drop(&mut self) {
        self.devices.static_buffer.destroy();
        self.devices.dynamic_buffer.destroy();
        self.devices.index_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParticleError;
    use crate::render::particles::device::HostBuffer;
    use crate::render::particles::particle::{ParticleTexture, Rectangle, Texture, TextureUvs};
    use crate::render::particles::schema::ParticleAttribute;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn particles(count: usize) -> Vec<Particle> {
        let texture: Arc<dyn ParticleTexture> = Arc::new(Texture::whole(8.0, 8.0));
        (0..count)
            .map(|i| Particle::new(texture.clone()).with_position(i as f32, 0.0))
            .collect()
    }

    fn host_buffer(initial: usize, min: usize) -> ParticleBuffer<HostBuffer> {
        ParticleBuffer::new(
            DynamicProperties::default(),
            ParticleBufferOptions::default().with_capacity(initial, min),
            DeviceBuffers::host(),
        )
        .unwrap()
    }

    #[test]
    fn test_initial_allocation() {
        let buffer = host_buffer(5, 5);
        assert_eq!(buffer.capacity(), 5);
        assert_eq!(buffer.indices().len(), 30);
        assert_eq!(buffer.static_data().len(), 5 * 4 * 6);
        assert_eq!(buffer.dynamic_data().len(), 5 * 4 * 2);
        assert_eq!(buffer.devices().index_buffer.upload_count(), 1);
    }

    #[test]
    fn test_initial_capacity_clamped_to_floor() {
        let buffer = host_buffer(2, 8);
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ParticleBuffer::new(
            DynamicProperties::default(),
            ParticleBufferOptions::default().with_capacity(4, 0),
            DeviceBuffers::host(),
        );
        assert!(matches!(result, Err(ParticleError::Config(_))));
    }

    #[test]
    fn test_grow() {
        let mut buffer = host_buffer(5, 5);
        buffer.update(&particles(10), false).unwrap();

        assert!(buffer.capacity() >= 10);
        assert!(buffer.indices().len() / 6 >= 10);
        assert_eq!(buffer.geometry().capacity(), buffer.capacity());
        assert_eq!(buffer.stats().reallocations, 1);
        assert_eq!(buffer.devices().index_buffer.upload_count(), 2);
    }

    #[test]
    fn test_grow_uses_factor() {
        let mut buffer = host_buffer(10, 5);
        buffer.update(&particles(11), false).unwrap();
        assert_eq!(buffer.capacity(), 15);
    }

    #[test]
    fn test_grow_switches_to_u32_indices() {
        let mut buffer = host_buffer(16_000, 16);
        buffer.update(&particles(16_000), false).unwrap();
        assert!(matches!(buffer.indices(), QuadIndices::U16(_)));
        assert_eq!(buffer.geometry().index_format(), wgpu::IndexFormat::Uint16);

        buffer.update(&particles(17_000), false).unwrap();
        assert!(buffer.capacity() >= 17_000);
        assert!(matches!(buffer.indices(), QuadIndices::U32(_)));
        assert_eq!(buffer.geometry().index_format(), wgpu::IndexFormat::Uint32);
        assert_eq!(buffer.indices().len(), buffer.capacity() * 6);
    }

    #[test]
    fn test_shrink_target_holds_large_counts() {
        let mut options = ParticleBufferOptions::default().with_capacity(4, 4);
        options.buffer.shrink_factor = 1.0;
        let mut buffer =
            ParticleBuffer::new(DynamicProperties::default(), options, DeviceBuffers::host())
                .unwrap();

        // 超过 f32 可精确表示的整数范围
        let count = (1usize << 24) + 1;
        buffer.capacity = 1 << 26;
        let target = buffer.next_capacity(count).unwrap();
        assert!(target >= count);
        assert!(target < buffer.capacity);
    }

    #[test]
    fn test_shrink_respects_floor() {
        let mut buffer = host_buffer(5, 5);
        buffer.update(&particles(20), false).unwrap();
        let grown = buffer.capacity();
        assert!(grown >= 20);

        buffer.update(&particles(2), false).unwrap();
        assert!(buffer.capacity() < grown);
        assert!(buffer.capacity() >= 5);
    }

    #[test]
    fn test_shrink_to_floor_when_empty() {
        let mut buffer = host_buffer(64, 4);
        buffer.update(&[], false).unwrap();
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_no_reallocation_within_hysteresis() {
        let mut buffer = host_buffer(30, 5);
        buffer.update(&particles(10), false).unwrap();
        buffer.update(&particles(12), false).unwrap();
        buffer.update(&particles(11), false).unwrap();
        assert_eq!(buffer.capacity(), 30);
        assert_eq!(buffer.stats().reallocations, 0);
    }

    #[test]
    fn test_static_reused_without_force() {
        let mut buffer = host_buffer(5, 5);
        let list = particles(3);

        buffer.update(&list, false).unwrap();
        buffer.update(&list, false).unwrap();

        assert_eq!(buffer.stats().static_packs, 1);
        assert_eq!(buffer.devices().static_buffer.upload_count(), 1);
        assert_eq!(buffer.stats().dynamic_packs, 2);

        buffer.update(&list, true).unwrap();
        assert_eq!(buffer.stats().static_packs, 2);
    }

    #[test]
    fn test_upload_only_used_bytes() {
        let mut buffer = host_buffer(8, 8);
        buffer.update(&particles(3), false).unwrap();

        // 3 particles * 4 vertices * 8 bytes
        assert_eq!(buffer.devices().dynamic_buffer.data().len(), 96);
        // 3 particles * 4 vertices * 24 bytes
        assert_eq!(buffer.devices().static_buffer.data().len(), 288);
        assert_eq!(buffer.devices().dynamic_buffer.allocated(), 8 * 4 * 8);
    }

    #[test]
    fn test_growth_forces_static_upload() {
        let mut buffer = host_buffer(5, 5);
        buffer.update(&particles(3), false).unwrap();
        buffer.update(&particles(8), false).unwrap();

        assert_eq!(buffer.stats().static_packs, 2);
        assert_eq!(buffer.devices().static_buffer.allocation_count(), 2);
    }

    #[test]
    fn test_missing_frame_invalidates_static() {
        #[derive(Debug)]
        struct Pending;
        impl ParticleTexture for Pending {
            fn orig(&self) -> Option<Rectangle> {
                None
            }
            fn trim(&self) -> Option<Rectangle> {
                None
            }
            fn uvs(&self) -> TextureUvs {
                TextureUvs::default()
            }
        }

        let mut buffer = host_buffer(5, 5);
        let mut list = particles(2);
        list.push(Particle::new(Arc::new(Pending)));

        let result = buffer.update(&list, true);
        assert!(matches!(result, Err(ParticleError::MissingFrame { index: 2 })));
        assert_eq!(buffer.devices().static_buffer.upload_count(), 0);

        list.pop();
        buffer.update(&list, false).unwrap();
        assert_eq!(buffer.devices().static_buffer.upload_count(), 1);
    }

    #[test]
    fn test_all_static_skips_dynamic_upload() {
        let mut buffer = ParticleBuffer::new(
            DynamicProperties::none(),
            ParticleBufferOptions::default().with_capacity(4, 4),
            DeviceBuffers::host(),
        )
        .unwrap();
        buffer.update(&particles(2), false).unwrap();

        assert_eq!(buffer.devices().dynamic_buffer.upload_count(), 0);
        let statics = buffer.layout().static_layout();
        let position = statics.offset_of(ParticleAttribute::Position).unwrap();
        let second = statics.stride() * 4;
        assert_eq!(buffer.devices().static_buffer.f32_at(second + position), 1.0);
    }

    #[test]
    fn test_precompiled_strategy_matches() {
        let list = particles(7);
        let mut fused = host_buffer(4, 4);
        let mut precompiled = ParticleBuffer::new(
            DynamicProperties::default(),
            ParticleBufferOptions::default()
                .with_capacity(4, 4)
                .with_strategy(PackingStrategy::Precompiled),
            DeviceBuffers::host(),
        )
        .unwrap();

        fused.update(&list, true).unwrap();
        precompiled.update(&list, true).unwrap();

        assert_eq!(precompiled.strategy(), PackingStrategy::Precompiled);
        assert_eq!(
            fused.devices().static_buffer.data(),
            precompiled.devices().static_buffer.data()
        );
        assert_eq!(
            fused.devices().dynamic_buffer.data(),
            precompiled.devices().dynamic_buffer.data()
        );
    }

    #[test]
    fn test_with_cache_shares_packers() {
        let mut cache = PackerCache::new();
        for _ in 0..3 {
            ParticleBuffer::with_cache(
                DynamicProperties::default(),
                ParticleBufferOptions::default(),
                DeviceBuffers::host(),
                &mut cache,
            )
            .unwrap();
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_drop_releases_device_buffers() {
        struct Tracked(Rc<Cell<u32>>);
        impl DeviceBuffer for Tracked {
            fn upload(&mut self, _data: &[u8], _byte_length: usize, _size_changed: bool) {}
            fn destroy(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let released = Rc::new(Cell::new(0));
        let devices = DeviceBuffers {
            static_buffer: Tracked(released.clone()),
            dynamic_buffer: Tracked(released.clone()),
            index_buffer: Tracked(released.clone()),
        };
        let buffer = ParticleBuffer::new(
            DynamicProperties::default(),
            ParticleBufferOptions::default(),
            devices,
        )
        .unwrap();

        drop(buffer);
        assert_eq!(released.get(), 3);
    }
}
