//! 预编译打包表
//!
//! 每个属性一个手写函数，一次写入全部粒子的该属性，
//! 每个粒子前进 `stride × 4` 个字。按描述符顺序依次调用即可组合出
//! 与融合打包函数逐字节相同的结果。
//!
//! 这是可移植的基准实现，融合版本以它为准进行校验。

use super::particle::Particle;
use super::schema::{ParticleAttribute, PartitionLayout, VERTICES_PER_PARTICLE};
use super::view::ViewableBuffer;
use crate::core::{ParticleError, ParticleResult};

/// 单属性批量写入函数
///
/// 参数：粒子列表、目标数据区、第一个粒子的起始字偏移、步长（字）。
pub type AttributeWriter =
    fn(&[Particle], &mut ViewableBuffer, usize, usize) -> ParticleResult<()>;

/// 预编译写入表（模式顺序）
pub static PRECOMPILED_WRITERS: [(ParticleAttribute, AttributeWriter); 5] = [
    (ParticleAttribute::Vertex, write_vertex),
    (ParticleAttribute::Position, write_position),
    (ParticleAttribute::Rotation, write_rotation),
    (ParticleAttribute::Uvs, write_uvs),
    (ParticleAttribute::Color, write_color),
];

/// 查找属性对应的写入函数
pub fn writer_for(attribute: ParticleAttribute) -> AttributeWriter {
    PRECOMPILED_WRITERS[attribute.index()].1
}

/// 按分区描述符依次调用写入函数
pub fn pack_precompiled(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    layout: &PartitionLayout,
) -> ParticleResult<()> {
    let stride = layout.stride();
    let mut offset = 0;

    for descriptor in layout.descriptors() {
        writer_for(descriptor.attribute)(particles, view, offset, stride)?;
        offset += descriptor.format.word_count();
    }

    Ok(())
}

pub fn write_vertex(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    mut offset: usize,
    stride: usize,
) -> ParticleResult<()> {
    for (index, particle) in particles.iter().enumerate() {
        let texture = &particle.texture;
        let orig = texture
            .orig()
            .ok_or(ParticleError::MissingFrame { index })?;
        let sx = particle.scale_x;
        let sy = particle.scale_y;

        let (left, top, width, height) = match texture.trim() {
            Some(trim) => (
                trim.x - particle.anchor_x * orig.width,
                trim.y - particle.anchor_y * orig.height,
                trim.width,
                trim.height,
            ),
            None => (
                -particle.anchor_x * orig.width,
                -particle.anchor_y * orig.height,
                orig.width,
                orig.height,
            ),
        };
        let right = left + width;
        let bottom = top + height;

        view.set_f32(offset, left * sx);
        view.set_f32(offset + 1, top * sy);
        view.set_f32(offset + stride, right * sx);
        view.set_f32(offset + stride + 1, top * sy);
        view.set_f32(offset + stride * 2, right * sx);
        view.set_f32(offset + stride * 2 + 1, bottom * sy);
        view.set_f32(offset + stride * 3, left * sx);
        view.set_f32(offset + stride * 3 + 1, bottom * sy);

        offset += stride * VERTICES_PER_PARTICLE;
    }
    Ok(())
}

pub fn write_position(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    mut offset: usize,
    stride: usize,
) -> ParticleResult<()> {
    for particle in particles {
        let (x, y) = (particle.x, particle.y);

        view.set_f32(offset, x);
        view.set_f32(offset + 1, y);
        view.set_f32(offset + stride, x);
        view.set_f32(offset + stride + 1, y);
        view.set_f32(offset + stride * 2, x);
        view.set_f32(offset + stride * 2 + 1, y);
        view.set_f32(offset + stride * 3, x);
        view.set_f32(offset + stride * 3 + 1, y);

        offset += stride * VERTICES_PER_PARTICLE;
    }
    Ok(())
}

pub fn write_rotation(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    mut offset: usize,
    stride: usize,
) -> ParticleResult<()> {
    for particle in particles {
        let rotation = particle.rotation;

        view.set_f32(offset, rotation);
        view.set_f32(offset + stride, rotation);
        view.set_f32(offset + stride * 2, rotation);
        view.set_f32(offset + stride * 3, rotation);

        offset += stride * VERTICES_PER_PARTICLE;
    }
    Ok(())
}

pub fn write_uvs(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    mut offset: usize,
    stride: usize,
) -> ParticleResult<()> {
    for particle in particles {
        let uvs = particle.texture.uvs();

        view.set_f32(offset, uvs.x0);
        view.set_f32(offset + 1, uvs.y0);
        view.set_f32(offset + stride, uvs.x1);
        view.set_f32(offset + stride + 1, uvs.y1);
        view.set_f32(offset + stride * 2, uvs.x2);
        view.set_f32(offset + stride * 2 + 1, uvs.y2);
        view.set_f32(offset + stride * 3, uvs.x3);
        view.set_f32(offset + stride * 3 + 1, uvs.y3);

        offset += stride * VERTICES_PER_PARTICLE;
    }
    Ok(())
}

pub fn write_color(
    particles: &[Particle],
    view: &mut ViewableBuffer,
    mut offset: usize,
    stride: usize,
) -> ParticleResult<()> {
    for particle in particles {
        let color = particle.color;

        view.set_u32(offset, color);
        view.set_u32(offset + stride, color);
        view.set_u32(offset + stride * 2, color);
        view.set_u32(offset + stride * 3, color);

        offset += stride * VERTICES_PER_PARTICLE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::particles::particle::Texture;
    use crate::render::particles::schema::{DynamicProperties, ParticleLayout};
    use std::sync::Arc;

    #[test]
    fn test_table_order_matches_schema() {
        for (i, (attribute, _)) in PRECOMPILED_WRITERS.iter().enumerate() {
            assert_eq!(attribute.index(), i);
        }
    }

    #[test]
    fn test_position_advances_by_particle() {
        let texture = Arc::new(Texture::whole(4.0, 4.0));
        let particles = vec![
            Particle::new(texture.clone()).with_position(1.0, 2.0),
            Particle::new(texture).with_position(3.0, 4.0),
        ];

        let layout = ParticleLayout::new(DynamicProperties::default());
        let dynamic = layout.dynamic_layout();
        let mut view = ViewableBuffer::new(dynamic.words_for(2));
        pack_precompiled(&particles, &mut view, dynamic).unwrap();

        let expected = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 3.0, 4.0, 3.0, 4.0];
        for (i, value) in expected.iter().enumerate() {
            assert_eq!(view.f32_at(i), *value);
        }
    }

    #[test]
    fn test_offsets_accumulate() {
        let texture = Arc::new(Texture::whole(4.0, 4.0));
        let particles = vec![Particle::new(texture).with_rotation(0.25).with_tint(0x00FF00)];

        let layout = ParticleLayout::new(DynamicProperties::default());
        let statics = layout.static_layout();
        let mut view = ViewableBuffer::new(statics.words_for(1));
        pack_precompiled(&particles, &mut view, statics).unwrap();

        let rotation = statics.offset_of(ParticleAttribute::Rotation).unwrap();
        let color = statics.offset_of(ParticleAttribute::Color).unwrap();
        for corner in 0..4 {
            assert_eq!(view.f32_at(rotation + corner * statics.stride()), 0.25);
            assert_eq!(view.u32_at(color + corner * statics.stride()), particles[0].color);
        }
    }
}
