use std::any::type_name;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::rc::Rc;

use foldhash::{HashMap, HashMapExt};
use tracing::{debug, trace, warn};

use crate::{
    Acquisition, Activity, Error, Instance, InstanceId, InstancePool, LinkerData,
    PayloadFactory, Placement, PoolRegistry, PoolSettings, Pooled, Result,
};

/// Hands out reusable instances from one pool per configured kind.
///
/// A pooler is created from a [`PoolRegistry`] and immediately creates the initial instances of
/// every kind, so that the cost of creating payloads is paid up front rather than while
/// spawning.
///
/// # Spawning
///
/// [`spawn()`][Self::spawn] and its variants pick an instance as follows:
///
/// 1. If the kind has an inactive instance, the oldest-created one is reused.
/// 2. Otherwise, if the kind may expand and has not reached its maximum size, one new instance
///    is created.
/// 3. Otherwise the instance that has gone longest without being recycled is taken over, even
///    though it is still in use. Any handle to it from before becomes stale.
///
/// In every case the placement is applied before the instance is activated.
///
/// # Bookkeeping
///
/// The pooler tracks which instances are active through their lifecycle notifications, so
/// instances deactivated through their handles (see [`Pooled::release()`] and
/// [`Pooled::set_active()`]) become available for reuse without the pooler being involved.
///
/// # Thread safety
///
/// This type is neither [`Send`] nor [`Sync`]. All pool operations happen on one thread.
///
/// # Examples
///
/// ```
/// use glam::Vec3;
/// use spawn_pool::{Acquisition, FactoryError, PoolConfig, PoolRegistry, Pooler};
///
/// #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
/// enum Effect {
///     Smoke,
/// }
///
/// let registry = PoolRegistry::new().with_pool(
///     PoolConfig::new(Effect::Smoke)
///         .template(|| -> Result<Vec<u8>, FactoryError> { Ok(vec![0; 64]) })
///         .initial_size(2)
///         .auto_expand(true)
///         .max_expand_size(3),
/// );
///
/// let mut pooler = Pooler::initialize(registry).unwrap();
///
/// let a = pooler.spawn_at(Effect::Smoke, Vec3::ZERO).unwrap();
/// let b = pooler.spawn(Effect::Smoke).unwrap();
/// let c = pooler.spawn(Effect::Smoke).unwrap();
///
/// assert_eq!(a.acquisition(), Acquisition::Reused);
/// assert_eq!(b.acquisition(), Acquisition::Reused);
/// assert_eq!(c.acquisition(), Acquisition::Expanded);
/// assert_eq!(pooler.len(Effect::Smoke).unwrap(), 3);
///
/// // Reclaim everything and start over.
/// assert_eq!(pooler.disable_all(), 3);
/// assert_eq!(pooler.active_count(Effect::Smoke).unwrap(), 0);
/// ```
pub struct Pooler<K, F: PayloadFactory> {
    // In registration order.
    pools: Vec<KindPool<K, F>>,

    // Kind to index in `pools`.
    // We use foldhash for better performance with small hash tables.
    index: HashMap<K, usize>,
}

struct KindPool<K, F: PayloadFactory> {
    kind: K,
    template: F,
    settings: PoolSettings,
    instances: InstancePool<K, F::Payload>,
}

impl<K, F> Pooler<K, F>
where
    K: Copy + Eq + Hash + Debug,
    F: PayloadFactory,
{
    /// Validates the registry and creates the initial instances of every pool kind.
    ///
    /// Out-of-range sizes are corrected with a warning, as described in
    /// [`PoolRegistry::validate()`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a pool kind has no template, if a kind is
    /// registered more than once or if a template fails to create one of the initial payloads.
    pub fn initialize(mut registry: PoolRegistry<K, F>) -> Result<Self> {
        registry.validate();

        let configs = registry.into_configs();

        let mut pools = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());

        for config in configs {
            let (kind, template, settings) = config.into_parts();

            if index.contains_key(&kind) {
                return Err(Error::configuration(kind, "the kind is configured more than once"));
            }

            let Some(template) = template else {
                return Err(Error::configuration(kind, "the template is not set"));
            };

            let mut instances = InstancePool::new(kind);

            for _ in 0..settings.initial_size() {
                let payload = template
                    .create()
                    .map_err(|source| Error::factory_failed(kind, source))?;

                _ = instances.push(payload);
            }

            debug!(
                ?kind,
                initial_size = settings.initial_size(),
                auto_expand = settings.auto_expand(),
                max_expand_size = settings.max_expand_size(),
                "pool created"
            );

            index.insert(kind, pools.len());
            pools.push(KindPool {
                kind,
                template,
                settings,
                instances,
            });
        }

        Ok(Self { pools, index })
    }

    /// Spawns an instance at the origin with no rotation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured, or
    /// [`Error::Configuration`] if the pool needed to expand and its template failed.
    pub fn spawn(&mut self, kind: K) -> Result<Pooled<K, F::Payload>> {
        self.spawn_at(kind, Placement::IDENTITY)
    }

    /// Spawns an instance at the given placement. A bare position is also accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured, or
    /// [`Error::Configuration`] if the pool needed to expand and its template failed.
    pub fn spawn_at(
        &mut self,
        kind: K,
        placement: impl Into<Placement>,
    ) -> Result<Pooled<K, F::Payload>> {
        let placement = placement.into();
        let pool = self.pool_mut(kind)?;

        let (slot, acquisition) = pool.acquire()?;

        let cell = pool.instances.instance(slot);
        let generation = Instance::claim(cell, placement);

        Ok(Pooled::new(Rc::clone(cell), generation, acquisition))
    }

    /// Spawns an instance at the given placement and starts linking it to a target.
    ///
    /// This behaves exactly like [`spawn_at()`][Self::spawn_at] followed by
    /// [`Pooled::start_linking()`]. If the link cannot be started, the instance is still
    /// spawned, unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured, or
    /// [`Error::Configuration`] if the pool needed to expand and its template failed.
    pub fn spawn_linked(
        &mut self,
        kind: K,
        placement: impl Into<Placement>,
        linker: LinkerData,
    ) -> Result<Pooled<K, F::Payload>> {
        let pooled = self.spawn_at(kind, placement)?;

        _ = pooled.start_linking(linker);

        Ok(pooled)
    }

    /// Deactivates every active instance of a kind, making all of them available for reuse.
    ///
    /// Returns how many instances were deactivated. Calling this again right away does
    /// nothing and returns 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn disable_pool(&mut self, kind: K) -> Result<usize> {
        Ok(self.pool_mut(kind)?.disable())
    }

    /// Deactivates every active instance of every kind.
    ///
    /// Returns how many instances were deactivated.
    pub fn disable_all(&mut self) -> usize {
        self.pools
            .iter()
            .map(KindPool::disable)
            .fold(0_usize, usize::wrapping_add)
    }

    /// The payload template of a kind, for creating payloads outside the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn payload_template(&self, kind: K) -> Result<&F> {
        Ok(&self.pool(kind)?.template)
    }

    /// Advances every running link by one tick.
    ///
    /// Each active linked instance moves to its target position. Links whose target has been
    /// dropped are stopped with a warning.
    ///
    /// Returns how many instances were moved.
    pub fn update_links(&mut self) -> usize {
        let mut moved = 0_usize;

        for pool in &self.pools {
            for slot in pool.instances.active_slots() {
                let mut instance = pool.instances.instance(slot).borrow_mut();

                let Some(link) = instance.link() else {
                    continue;
                };

                match link.follow(instance.placement().position()) {
                    Some(position) => {
                        instance.set_position(position);
                        moved = moved.wrapping_add(1);
                    }
                    None => {
                        instance.stop_link();
                        warn!(
                            kind = ?pool.kind,
                            instance = %instance.id(),
                            "link target is gone, stopped linking"
                        );
                    }
                }
            }
        }

        trace!(moved, "links updated");

        moved
    }

    /// The configured kinds, in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = K> + '_ {
        self.pools.iter().map(|pool| pool.kind)
    }

    /// Whether the kind is configured.
    #[must_use]
    pub fn contains_kind(&self, kind: K) -> bool {
        self.index.contains_key(&kind)
    }

    /// The validated sizing policy of a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn settings(&self, kind: K) -> Result<PoolSettings> {
        Ok(self.pool(kind)?.settings)
    }

    /// The number of instances of a kind, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn len(&self, kind: K) -> Result<usize> {
        Ok(self.pool(kind)?.instances.len())
    }

    /// The number of active instances of a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn active_count(&self, kind: K) -> Result<usize> {
        Ok(self.pool(kind)?.instances.active_count())
    }

    /// The number of inactive instances of a kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn inactive_count(&self, kind: K) -> Result<usize> {
        Ok(self.pool(kind)?.instances.inactive_count())
    }

    /// The active instances of a kind, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn active(&self, kind: K) -> Result<Vec<InstanceId>> {
        Ok(to_ids(self.pool(kind)?.instances.active_slots()))
    }

    /// The inactive instances of a kind, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn inactive(&self, kind: K) -> Result<Vec<InstanceId>> {
        Ok(to_ids(self.pool(kind)?.instances.inactive_slots()))
    }

    /// All instances of a kind, from the next to be taken over when the pool is exhausted to
    /// the most recently taken over.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPool`] if the kind is not configured.
    pub fn ring(&self, kind: K) -> Result<Vec<InstanceId>> {
        Ok(self
            .pool(kind)?
            .instances
            .ring()
            .map(InstanceId::new)
            .collect())
    }

    fn pool(&self, kind: K) -> Result<&KindPool<K, F>> {
        self.index
            .get(&kind)
            .and_then(|&index| self.pools.get(index))
            .ok_or_else(|| Error::unknown_pool(kind))
    }

    fn pool_mut(&mut self, kind: K) -> Result<&mut KindPool<K, F>> {
        self.index
            .get(&kind)
            .and_then(|&index| self.pools.get_mut(index))
            .ok_or_else(|| Error::unknown_pool(kind))
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        for pool in &self.pools {
            pool.instances.integrity_check();

            assert!(
                pool.instances.len() <= pool.settings.capacity_limit(),
                "pool {:?} holds more instances than its configuration allows",
                pool.kind
            );
            assert!(
                pool.instances.len() >= pool.settings.initial_size(),
                "pool {:?} holds fewer instances than it was created with",
                pool.kind
            );
        }
    }
}

impl<K, F> KindPool<K, F>
where
    K: Copy + Debug,
    F: PayloadFactory,
{
    fn can_expand(&self) -> bool {
        self.settings.auto_expand() && self.instances.len() < self.settings.max_expand_size()
    }

    /// Picks the instance to hand out next and makes sure it is inactive.
    fn acquire(&mut self) -> Result<(usize, Acquisition)> {
        if let Some(slot) = self.instances.next_inactive() {
            trace!(kind = ?self.kind, slot, "reusing inactive instance");
            return Ok((slot, Acquisition::Reused));
        }

        if self.can_expand() {
            let payload = self
                .template
                .create()
                .map_err(|source| Error::factory_failed(self.kind, source))?;

            let slot = self.instances.push(payload);

            debug!(
                kind = ?self.kind,
                slot,
                len = self.instances.len(),
                max_expand_size = self.settings.max_expand_size(),
                "pool expanded"
            );

            return Ok((slot, Acquisition::Expanded));
        }

        let slot = self
            .instances
            .rotate_front()
            .expect("a pool always holds at least one instance after initialization");

        // Deactivating also stops any link, so the new owner does not inherit it.
        Instance::set_activity(self.instances.instance(slot), Activity::Inactive);

        debug!(
            kind = ?self.kind,
            slot,
            len = self.instances.len(),
            "pool exhausted, recycling least recently recycled instance"
        );

        Ok((slot, Acquisition::Recycled))
    }

    fn disable(&self) -> usize {
        // Deactivation removes slots from the active set, so we work from a snapshot.
        let snapshot = self.instances.active_slots();

        let mut disabled = 0_usize;

        for slot in snapshot {
            if Instance::set_activity(self.instances.instance(slot), Activity::Inactive) {
                disabled = disabled.wrapping_add(1);
            }
        }

        debug!(kind = ?self.kind, disabled, "pool disabled");

        disabled
    }
}

fn to_ids(slots: Vec<usize>) -> Vec<InstanceId> {
    slots.into_iter().map(InstanceId::new).collect()
}

impl<K: Debug, F: PayloadFactory> Debug for Pooler<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooler")
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl<K: Debug, F: PayloadFactory> Debug for KindPool<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindPool")
            .field("kind", &self.kind)
            .field("template_type", &type_name::<F>())
            .field("settings", &self.settings)
            .field("instances", &self.instances)
            .finish_non_exhaustive()
    }
}
