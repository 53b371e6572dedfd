//! Basic usage of the `spawn_pool` crate:
//!
//! * Configuring pools for two kinds of effects.
//! * Spawning, releasing and recycling instances.
//! * Making an instance follow a moving anchor.
//!
//! Logs at `debug` level so the decisions the pool makes are visible.

use std::rc::Rc;

use glam::Vec3;
use spawn_pool::{
    Acquisition, Anchor, Axes, BoxedFactory, LinkerData, PoolConfig, PoolRegistry, Pooler,
};
use tracing::Level;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum Effect {
    Spark,
    Smoke,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let spark: BoxedFactory<String> = Box::new(|| Ok("spark".to_string()));
    let smoke: BoxedFactory<String> = Box::new(|| Ok("smoke".to_string()));

    let registry = PoolRegistry::new()
        .with_pool(PoolConfig::new(Effect::Spark).template(spark).initial_size(2))
        .with_pool(
            PoolConfig::new(Effect::Smoke)
                .template(smoke)
                .initial_size(1)
                .auto_expand(true)
                .max_expand_size(3),
        );

    let mut pooler = match Pooler::initialize(registry) {
        Ok(pooler) => pooler,
        Err(error) => {
            eprintln!("failed to set up pools: {error}");
            return;
        }
    };

    // Three sparks from a pool of two: the third one takes over the first.
    let sparks: Vec<_> = (0..3)
        .filter_map(|_| pooler.spawn(Effect::Spark).ok())
        .collect();

    for spark in &sparks {
        println!(
            "spark {} acquired via {:?}, still current: {}",
            spark.id(),
            spark.acquisition(),
            spark.is_current()
        );
    }

    // Smoke follows the player along the ground.
    let player = Rc::new(Anchor::new(Vec3::new(0.0, 1.8, 0.0)));

    let Ok(trail) = pooler.spawn_linked(
        Effect::Smoke,
        Vec3::ZERO,
        LinkerData::new(&player).axes(Axes::XZ),
    ) else {
        return;
    };

    for step in 1..=3_u8 {
        player.set_position(Vec3::new(f32::from(step), 1.8, 0.0));
        _ = pooler.update_links();
        println!("smoke trail is at {}", trail.position());
    }

    if let Ok(extra) = pooler.spawn(Effect::Smoke) {
        assert_eq!(extra.acquisition(), Acquisition::Expanded);
        println!("smoke pool grew to {:?} instances", pooler.len(Effect::Smoke));
    }

    let reclaimed = pooler.disable_all();
    println!("reclaimed {reclaimed} instances, trail still linked: {}", trail.is_linked());
}
