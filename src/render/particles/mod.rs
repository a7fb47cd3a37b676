//! 四边形粒子批处理
//!
//! 以最低的每帧开销渲染大量纹理四边形。核心问题不是绘制，
//! 而是把每个粒子的属性紧凑地打包进可直接上传的顶点缓冲区。
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Quad Particle Pipeline                   │
//! ├─────────────────────────────────────────────────────────┤
//! │  ParticleContainer                                       │
//! │     - 有序粒子列表（绘制顺序）                             │
//! │     - 结构变化 → 脏标记                                    │
//! │                                                          │
//! │  ParticleBuffer                                          │
//! │     - 容量增长 / 带下限的收缩                              │
//! │     - 动态区：每帧打包                                     │
//! │     - 静态区：仅在脏标记或重新分配后打包                   │
//! │     - 四边形索引 + 属性绑定                                │
//! │                                                          │
//! │  Packer (schema → synthesize / fallback)                 │
//! │     - 按可变性划分属性，每个分区一个单循环打包函数         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```
//! use std::sync::Arc;
//! use quad_particles::render::particles::{
//!     DeviceBuffers, Particle, ParticleBufferOptions, ParticleContainer, Texture,
//! };
//!
//! let texture = Arc::new(Texture::whole(16.0, 16.0));
//! let mut container = ParticleContainer::default();
//! for i in 0..3 {
//!     container.add_particle(Particle::new(texture.clone()).with_position(i as f32 * 10.0, 0.0));
//! }
//!
//! let mut buffer = container
//!     .create_buffer(ParticleBufferOptions::default(), DeviceBuffers::host())
//!     .unwrap();
//! container.render(&mut buffer).unwrap();
//! assert_eq!(buffer.devices().dynamic_buffer.f32_at(8), 10.0);
//! ```

pub mod buffer;
pub mod container;
pub mod device;
pub mod fallback;
pub mod indices;
pub mod particle;
pub mod schema;
pub mod synthesize;
pub mod view;

pub use buffer::{ParticleBuffer, ParticleBufferOptions, ParticleBufferStats};
pub use container::ParticleContainer;
pub use device::{
    AttributeBinding, BufferSlot, DeviceBuffer, DeviceBuffers, HostBuffer, ParticleGeometry,
    WgpuBuffer,
};
pub use indices::{create_indices_for_quads, write_indices_for_quads, QuadIndices};
pub use particle::{Particle, ParticleTexture, Rectangle, Texture, TextureUvs};
pub use schema::{
    particle_schema, AttributeFormat, DynamicProperties, ParticleAttribute, ParticleLayout,
    PartitionLayout, PropertyDescriptor,
};
pub use synthesize::{
    build_packers, compose_precompiled, synthesize, Packer, PackerCache, PackerPair,
    PackingStrategy,
};
pub use view::ViewableBuffer;
