use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};
use tracing::warn;

use crate::{
    Activity, Instance, InstanceCell, InstanceId, LifecycleListener, LinkerData, Placement,
    SubscriptionId,
};

/// How [`Pooler::spawn()`][crate::Pooler::spawn] obtained the instance it returned.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Acquisition {
    /// An inactive instance was reused. This is the common case.
    Reused,

    /// The pool had no inactive instance and grew by one new instance.
    Expanded,

    /// The pool was exhausted and could not grow, so the least recently recycled instance was
    /// taken away from whoever was using it and handed out again.
    ///
    /// This is accepted pool behavior, not an error, but it means some earlier handle to the
    /// same instance is now stale.
    Recycled,
}

/// A handle to an instance handed out by a [`Pooler`][crate::Pooler].
///
/// The pool keeps ownership of the instance; the handle gives shared access to it. Handles are
/// cheap to clone and all clones refer to the same instance.
///
/// # Staleness
///
/// An instance can be handed out again once it has been released, or forcibly when its pool
/// is exhausted. A handle remembers which hand-out it came from, and
/// [`is_current()`][Self::is_current] tells whether the instance has been handed out again
/// since. Most accessors keep working on stale handles, as the instance itself still exists,
/// but [`release()`][Self::release] does nothing on a stale handle so that a late release
/// cannot take the instance away from its new owner.
///
/// # Thread safety
///
/// This type is neither [`Send`] nor [`Sync`]; pools and their instances belong to a single
/// thread.
///
/// # Examples
///
/// ```
/// use glam::Vec3;
/// use spawn_pool::{FactoryError, PoolConfig, PoolRegistry, Pooler};
///
/// let registry = PoolRegistry::new().with_pool(
///     PoolConfig::new("spark")
///         .template(|| -> Result<String, FactoryError> { Ok("spark".to_string()) })
///         .initial_size(1),
/// );
/// let mut pooler = Pooler::initialize(registry).unwrap();
///
/// let first = pooler.spawn_at("spark", Vec3::X).unwrap();
/// assert!(first.is_active());
/// assert_eq!(first.position(), Vec3::X);
/// assert_eq!(first.with_payload(String::len), 5);
///
/// // The pool has one instance and cannot grow, so it is taken over by the next spawn.
/// let second = pooler.spawn("spark").unwrap();
/// assert!(second.ptr_eq(&first));
/// assert!(second.is_current());
/// assert!(!first.is_current());
///
/// // Releasing through the stale handle does nothing.
/// assert!(!first.release());
/// assert!(second.is_active());
/// ```
pub struct Pooled<K, T> {
    cell: InstanceCell<K, T>,
    generation: u64,
    acquisition: Acquisition,
}

impl<K: Copy, T> Pooled<K, T> {
    pub(crate) fn new(cell: InstanceCell<K, T>, generation: u64, acquisition: Acquisition) -> Self {
        Self {
            cell,
            generation,
            acquisition,
        }
    }

    /// The ID of the instance within its pool kind.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.cell.borrow().id()
    }

    /// The pool kind the instance belongs to.
    #[must_use]
    pub fn kind(&self) -> K {
        self.cell.borrow().kind()
    }

    /// How the pool obtained the instance for this handle.
    #[must_use]
    pub fn acquisition(&self) -> Acquisition {
        self.acquisition
    }

    /// The hand-out this handle came from. The first hand-out of an instance is generation 1.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the instance has not been handed out again since this handle was created.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.cell.borrow().generation() == self.generation
    }

    /// Whether the instance is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cell.borrow().is_active()
    }

    /// Whether both handles refer to the same instance, regardless of generation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// The current placement of the instance.
    #[must_use]
    pub fn placement(&self) -> Placement {
        self.cell.borrow().placement()
    }

    /// The current position of the instance.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.placement().position()
    }

    /// The current rotation of the instance.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.placement().rotation()
    }

    /// Moves the instance. A running link overrides the followed axes on its next tick.
    pub fn set_position(&self, position: Vec3) {
        self.cell.borrow_mut().set_position(position);
    }

    /// Rotates the instance.
    pub fn set_rotation(&self, rotation: Quat) {
        self.cell.borrow_mut().set_rotation(rotation);
    }

    /// Calls `f` with a shared reference to the payload and returns its result.
    ///
    /// The instance stays borrowed only while `f` runs, so pool operations after the call
    /// never find it borrowed.
    ///
    /// # Panics
    ///
    /// Panics if `f` accesses the same instance mutably, either through a handle or through
    /// a pool operation such as spawning or disabling its kind.
    pub fn with_payload<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.cell.borrow().payload())
    }

    /// Calls `f` with an exclusive reference to the payload and returns its result.
    ///
    /// The instance stays borrowed only while `f` runs, so pool operations after the call
    /// never find it borrowed.
    ///
    /// # Panics
    ///
    /// Panics if `f` accesses the same instance in any way, either through a handle or
    /// through a pool operation such as spawning or disabling its kind.
    pub fn with_payload_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(self.cell.borrow_mut().payload_mut())
    }

    /// Activates or deactivates the instance, whether or not this handle is current.
    ///
    /// The pool learns about the change through the instance's lifecycle notifier, so this
    /// keeps the pool bookkeeping correct. Deactivating an instance makes it available for
    /// reuse and stops its link.
    ///
    /// Returns `false` if the instance was already in the requested state.
    pub fn set_active(&self, active: bool) -> bool {
        let activity = if active {
            Activity::Active
        } else {
            Activity::Inactive
        };

        Instance::set_activity(&self.cell, activity)
    }

    /// Returns the instance to its pool, making it available for reuse.
    ///
    /// Does nothing if the handle is stale or the instance is already inactive.
    /// Returns whether the instance was deactivated.
    pub fn release(&self) -> bool {
        if !self.is_current() {
            return false;
        }

        self.set_active(false)
    }

    /// Subscribes a listener to activity transitions of this instance.
    ///
    /// The subscription belongs to the instance, not the handle, so it stays in place when
    /// the instance is handed out again.
    pub fn subscribe(&self, listener: Rc<dyn LifecycleListener<K>>) -> SubscriptionId {
        self.cell.borrow_mut().notifier_mut().subscribe(listener)
    }

    /// Removes a subscription made through [`subscribe()`][Self::subscribe].
    ///
    /// Returns `false` if there was no such subscription.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.cell.borrow_mut().notifier_mut().unsubscribe(subscription)
    }

    /// Starts following a target, applying the first step immediately.
    ///
    /// Does nothing if a link is already running. Refuses to start (with a warning) if the
    /// instance is inactive or the target has already been dropped.
    ///
    /// Returns whether a new link was started.
    pub fn start_linking(&self, linker: LinkerData) -> bool
    where
        K: fmt::Debug,
    {
        let mut instance = self.cell.borrow_mut();

        if instance.link().is_some() {
            return false;
        }

        if !instance.is_active() {
            warn!(
                kind = ?instance.kind(),
                instance = %instance.id(),
                "instance is inactive, cannot start linking"
            );
            return false;
        }

        let Some(position) = linker.follow(instance.placement().position()) else {
            warn!(
                kind = ?instance.kind(),
                instance = %instance.id(),
                "link target is gone, cannot start linking"
            );
            return false;
        };

        instance.set_position(position);
        instance.set_link(linker);
        true
    }

    /// Stops following the target. Does nothing if no link is running.
    ///
    /// Returns whether a link was stopped.
    pub fn stop_linking(&self) -> bool {
        self.cell.borrow_mut().stop_link()
    }

    /// Whether a link is running.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.cell.borrow().link().is_some()
    }
}

impl<K, T> Clone for Pooled<K, T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            generation: self.generation,
            acquisition: self.acquisition,
        }
    }
}

impl<K: fmt::Debug, T> fmt::Debug for Pooled<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Pooled");

        debug
            .field("generation", &self.generation)
            .field("acquisition", &self.acquisition);

        // The payload may be borrowed mutably while someone is formatting the handle.
        match self.cell.try_borrow() {
            Ok(instance) => debug.field("instance", &*instance),
            Err(_) => debug.field("instance", &"<borrowed>"),
        };

        debug.finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::{Cell, RefCell};

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{Anchor, LifecycleEvent};

    assert_not_impl_any!(Pooled<u8, u32>: Send, Sync);

    fn handle(payload: u32) -> Pooled<u8, u32> {
        let cell = Rc::new(RefCell::new(Instance::new(
            9_u8,
            InstanceId::new(0),
            payload,
        )));
        let generation = Instance::claim(&cell, Placement::IDENTITY);

        Pooled::new(cell, generation, Acquisition::Reused)
    }

    #[test]
    fn clones_share_instance() {
        let first = handle(5);
        let second = first.clone();

        first.with_payload_mut(|payload| *payload = 6);

        assert!(first.ptr_eq(&second));
        assert_eq!(second.with_payload(|payload| *payload), 6);
        assert_eq!(second.generation(), first.generation());
        assert_eq!(second.kind(), 9);
    }

    #[test]
    fn payload_access_ends_with_the_call() {
        let pooled = handle(1);

        let doubled = pooled.with_payload_mut(|payload| {
            *payload *= 2;
            *payload
        });
        assert_eq!(doubled, 2);

        // Nothing is left borrowed, so state changes go through.
        assert!(pooled.set_active(false));
        assert!(pooled.set_active(true));
        assert_eq!(pooled.with_payload(|payload| *payload), 2);
    }

    #[test]
    #[should_panic]
    fn state_change_inside_payload_access_panics() {
        let pooled = handle(1);

        pooled.with_payload(|_| pooled.set_active(false));
    }

    #[test]
    fn release_deactivates_once() {
        let pooled = handle(1);

        assert!(pooled.release());
        assert!(!pooled.is_active());
        assert!(!pooled.release());
    }

    #[test]
    fn stale_handle_does_not_release() {
        let old = handle(1);
        assert!(old.release());

        // Hand the instance out again.
        let generation = Instance::claim(&old.cell, Placement::IDENTITY);
        let new = Pooled::new(Rc::clone(&old.cell), generation, Acquisition::Reused);

        assert!(!old.is_current());
        assert!(new.is_current());
        assert!(!old.release());
        assert!(new.is_active());

        // Explicit state changes still act on the instance.
        assert!(old.set_active(false));
        assert!(!new.is_active());
    }

    #[test]
    fn linking_is_idempotent() {
        let pooled = handle(1);
        let anchor = Rc::new(Anchor::new(Vec3::new(3.0, 3.0, 3.0)));

        assert!(pooled.start_linking(LinkerData::new(&anchor)));
        assert_eq!(pooled.position(), Vec3::new(3.0, 3.0, 3.0));
        assert!(!pooled.start_linking(LinkerData::new(&anchor)));
        assert!(pooled.is_linked());

        assert!(pooled.stop_linking());
        assert!(!pooled.stop_linking());
        assert!(!pooled.is_linked());
    }

    #[test]
    fn linking_refused_without_target_or_when_inactive() {
        let pooled = handle(1);
        let anchor = Rc::new(Anchor::new(Vec3::ONE));
        let linker = LinkerData::new(&anchor);
        drop(anchor);

        assert!(!pooled.start_linking(linker));

        let anchor = Rc::new(Anchor::new(Vec3::ONE));
        assert!(pooled.release());
        assert!(!pooled.start_linking(LinkerData::new(&anchor)));
        assert!(!pooled.is_linked());
    }

    #[test]
    fn subscriptions_follow_the_instance() {
        #[derive(Default)]
        struct Deactivations(Cell<usize>);

        impl LifecycleListener<u8> for Deactivations {
            fn on_deactivated(&self, _event: &LifecycleEvent<u8>) {
                self.0.set(self.0.get() + 1);
            }
        }

        let pooled = handle(1);
        let listener = Rc::new(Deactivations::default());
        let subscription = pooled.subscribe(Rc::<Deactivations>::clone(&listener));

        assert!(pooled.set_active(false));
        assert_eq!(listener.0.get(), 1);

        assert!(pooled.unsubscribe(subscription));
        assert!(!pooled.unsubscribe(subscription));

        assert!(pooled.set_active(true));
        assert!(pooled.set_active(false));
        assert_eq!(listener.0.get(), 1);
    }

    #[test]
    fn debug_output_survives_borrow() {
        let pooled = handle(1);
        let formatted = pooled.with_payload_mut(|_| format!("{pooled:?}"));
        assert!(formatted.contains("<borrowed>"));

        assert!(format!("{pooled:?}").contains("Instance"));
    }
}
