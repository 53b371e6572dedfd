//! Compares spawning from a pool against creating a fresh payload from the same template.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{Criterion, criterion_group, criterion_main};
use spawn_pool::{FactoryError, PayloadFactory, PoolConfig, PoolRegistry, Pooler};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const POOL_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Kind {
    Particle,
}

struct ParticleTemplate;

impl PayloadFactory for ParticleTemplate {
    type Payload = Vec<f32>;

    fn create(&self) -> Result<Vec<f32>, FactoryError> {
        Ok(vec![0.0; 256])
    }
}

fn pooler(auto_expand: bool) -> Pooler<Kind, ParticleTemplate> {
    let registry = PoolRegistry::new().with_pool(
        PoolConfig::new(Kind::Particle)
            .template(ParticleTemplate)
            .initial_size(POOL_SIZE)
            .auto_expand(auto_expand)
            .max_expand_size(POOL_SIZE),
    );

    Pooler::initialize(registry).unwrap()
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_vs_create");

    group.bench_function("create_from_template", |b| {
        let pooler = pooler(false);
        let template = pooler.payload_template(Kind::Particle).unwrap();

        b.iter(|| black_box(template.create().unwrap()));
    });

    group.bench_function("spawn_release", |b| {
        let mut pooler = pooler(false);

        b.iter(|| {
            let pooled = pooler.spawn(black_box(Kind::Particle)).unwrap();
            _ = pooled.release();
            black_box(pooled)
        });
    });

    group.bench_function("spawn_recycle", |b| {
        b.iter_custom(|iters| {
            let mut pooler = pooler(false);

            // Every further spawn has to take over an active instance.
            for _ in 0..POOL_SIZE {
                _ = pooler.spawn(Kind::Particle).unwrap();
            }

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pooler.spawn(black_box(Kind::Particle)).unwrap());
            }

            start.elapsed()
        });
    });

    group.bench_function("disable_all", |b| {
        b.iter_custom(|iters| {
            let mut pooler = pooler(true);
            let mut elapsed = Duration::ZERO;

            for _ in 0..iters {
                for _ in 0..POOL_SIZE {
                    _ = pooler.spawn(Kind::Particle).unwrap();
                }

                let start = Instant::now();
                _ = black_box(pooler.disable_all());
                elapsed += start.elapsed();
            }

            elapsed
        });
    });

    group.finish();
}
