#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`Pooler`], a set of object pools keyed by kind that hand out
//! reusable instances instead of creating and destroying them on demand.
//!
//! Each pool kind is configured with a payload template (any [`PayloadFactory`]) and a sizing
//! policy. The pooler creates the initial instances of every kind up front. Spawning then
//! reuses an inactive instance, grows the pool by one instance if the kind allows it or, as a
//! last resort, takes over the instance that has gone longest without being recycled.
//!
//! # Features
//!
//! - **Kind-keyed pools**: Any `Copy + Eq + Hash + Debug` type identifies the pool kinds.
//! - **Bounded growth**: Pools may grow on demand, never beyond their configured maximum.
//! - **Round-robin recycling**: An exhausted pool recycles its instances in a fair rotation.
//! - **Lifecycle notifications**: Every activation and deactivation is announced to
//!   [`LifecycleListener`]s, no matter who caused it.
//! - **Stale handle detection**: A [`Pooled`] handle knows whether its instance has been
//!   handed out again since.
//! - **Position linking**: Instances can follow a moving [`Anchor`] with an offset and an
//!   axis mask.
//!
//! # Example
//!
//! ```rust
//! use glam::Vec3;
//! use spawn_pool::{Acquisition, BoxedFactory, PoolConfig, PoolRegistry, Pooler};
//!
//! #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
//! enum Projectile {
//!     Arrow,
//!     Fireball,
//! }
//!
//! let arrow: BoxedFactory<String> = Box::new(|| Ok("arrow".to_string()));
//! let fireball: BoxedFactory<String> = Box::new(|| Ok("fireball".to_string()));
//!
//! let registry = PoolRegistry::new()
//!     .with_pool(PoolConfig::new(Projectile::Arrow).template(arrow).initial_size(2))
//!     .with_pool(
//!         PoolConfig::new(Projectile::Fireball)
//!             .template(fireball)
//!             .initial_size(1)
//!             .auto_expand(true)
//!             .max_expand_size(2),
//!     );
//!
//! let mut pooler = Pooler::initialize(registry).unwrap();
//!
//! let arrow = pooler.spawn_at(Projectile::Arrow, Vec3::new(0.0, 1.0, 0.0)).unwrap();
//! assert_eq!(arrow.with_payload(String::clone), "arrow");
//! assert_eq!(arrow.acquisition(), Acquisition::Reused);
//!
//! // Returning the instance makes it available again.
//! arrow.release();
//! assert_eq!(pooler.active_count(Projectile::Arrow).unwrap(), 0);
//!
//! let _first = pooler.spawn(Projectile::Fireball).unwrap();
//! let second = pooler.spawn(Projectile::Fireball).unwrap();
//! assert_eq!(second.acquisition(), Acquisition::Expanded);
//! ```
//!
//! # Thread safety
//!
//! Pools are single-threaded. [`Pooler`] and [`Pooled`] are neither [`Send`] nor [`Sync`].

mod config;
mod error;
mod factory;
mod instance;
mod instance_pool;
mod lifecycle;
mod linker;
mod membership;
mod pooled;
mod pooler;

pub use config::*;
pub use error::*;
pub use factory::*;
pub use instance::*;
pub(crate) use instance_pool::*;
pub use lifecycle::*;
pub use linker::*;
pub(crate) use membership::*;
pub use pooled::*;
pub use pooler::*;
