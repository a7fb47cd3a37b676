//! 粒子打包性能基准测试
//!
//! 比较融合打包函数与逐属性预编译写入表

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quad_particles::render::particles::{
    create_indices_for_quads, particle_schema, DynamicProperties, Particle, ParticleTexture,
    PackingStrategy, Texture, ViewableBuffer, build_packers,
};
use std::sync::Arc;

fn make_particles(count: usize) -> Vec<Particle> {
    let texture: Arc<dyn ParticleTexture> = Arc::new(Texture::whole(32.0, 32.0));
    (0..count)
        .map(|i| {
            Particle::new(texture.clone())
                .with_position((i % 100) as f32, (i / 100) as f32)
                .with_anchor(0.5, 0.5)
                .with_rotation(i as f32 * 0.01)
        })
        .collect()
}

fn bench_static_packing(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_packing");
    let descriptors = particle_schema(&DynamicProperties::default());

    for count in [10_000usize, 100_000].iter() {
        let particles = make_particles(*count);

        for strategy in [PackingStrategy::Synthesized, PackingStrategy::Precompiled] {
            let pair = build_packers(&descriptors, strategy);
            let packer = pair.static_packer;
            let mut view = ViewableBuffer::new(packer.layout().words_for(*count));

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", strategy), count),
                count,
                |b, _| {
                    b.iter(|| {
                        packer.pack(black_box(&particles), &mut view).unwrap();
                        black_box(view.u32_at(0))
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_index_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("quad_indices");

    for count in [1_000usize, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| black_box(create_indices_for_quads(count)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_static_packing, bench_index_generation);
criterion_main!(benches);
