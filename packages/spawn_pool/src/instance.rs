use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::{LifecycleEvent, LifecycleNotifier, LinkerData};

/// Identifies an instance within its pool kind.
///
/// The ID is the instance's slot: the order in which instances of the kind were created,
/// starting from zero. Pools never remove instances, so an ID stays valid for as long as
/// the pool exists.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InstanceId {
    slot: usize,
}

impl InstanceId {
    pub(crate) fn new(slot: usize) -> Self {
        Self { slot }
    }

    /// The creation index of the instance within its pool kind.
    #[must_use]
    pub fn slot(self) -> usize {
        self.slot
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.slot)
    }
}

/// Where a spawned instance is placed: a position and a rotation.
///
/// # Examples
///
/// ```
/// use glam::{Quat, Vec3};
/// use spawn_pool::Placement;
///
/// let at_origin = Placement::default();
/// assert_eq!(at_origin.position(), Vec3::ZERO);
///
/// let turned = Placement::new(Vec3::X, Quat::from_rotation_y(1.0));
/// assert_eq!(turned.position(), Vec3::X);
///
/// // A bare position converts into a placement with no rotation.
/// let moved: Placement = Vec3::Y.into();
/// assert_eq!(moved.rotation(), Quat::IDENTITY);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Placement {
    position: Vec3,
    rotation: Quat,
}

impl Placement {
    /// Placement at the origin with no rotation.
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quat::IDENTITY);

    /// Creates a placement from a position and a rotation.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Creates a placement at `position` with no rotation.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// The position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// The rotation.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }
}

impl From<Vec3> for Placement {
    fn from(position: Vec3) -> Self {
        Self::at(position)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Activity {
    Active,
    Inactive,
}

/// One pooled payload plus the metadata the pool keeps about it.
///
/// Instances are shared between the pool and any handles callers hold, always through
/// [`InstanceCell`]. All activity transitions go through [`Instance::set_activity()`] so the
/// lifecycle notifier sees every one of them.
pub(crate) struct Instance<K, T> {
    kind: K,
    id: InstanceId,
    payload: T,
    activity: Activity,
    placement: Placement,

    /// Incremented every time the pool hands out this instance. Handles remember the value
    /// they were created with, which tells them whether they are still current.
    generation: u64,

    link: Option<LinkerData>,
    notifier: LifecycleNotifier<K>,
}

pub(crate) type InstanceCell<K, T> = Rc<RefCell<Instance<K, T>>>;

impl<K, T> Instance<K, T> {
    /// Creates an inactive instance with no placement and no listeners.
    pub(crate) fn new(kind: K, id: InstanceId, payload: T) -> Self {
        Self {
            kind,
            id,
            payload,
            activity: Activity::Inactive,
            placement: Placement::IDENTITY,
            generation: 0,
            link: None,
            notifier: LifecycleNotifier::new(),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn payload(&self) -> &T {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    pub(crate) fn is_active(&self) -> bool {
        self.activity == Activity::Active
    }

    pub(crate) fn placement(&self) -> Placement {
        self.placement
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.placement.position = position;
    }

    pub(crate) fn set_rotation(&mut self, rotation: Quat) {
        self.placement.rotation = rotation;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn link(&self) -> Option<&LinkerData> {
        self.link.as_ref()
    }

    /// Starts a link. The caller is responsible for checking that starting is allowed.
    pub(crate) fn set_link(&mut self, link: LinkerData) {
        self.link = Some(link);
    }

    /// Returns whether there was a link to stop.
    pub(crate) fn stop_link(&mut self) -> bool {
        self.link.take().is_some()
    }

    pub(crate) fn notifier_mut(&mut self) -> &mut LifecycleNotifier<K> {
        &mut self.notifier
    }
}

impl<K: Copy, T> Instance<K, T> {
    pub(crate) fn kind(&self) -> K {
        self.kind
    }

    /// Moves the instance to the given activity state and notifies listeners.
    ///
    /// Deactivating an instance also stops its link. Returns `false` without notifying anyone
    /// if the instance was already in the requested state.
    ///
    /// # Panics
    ///
    /// Panics if the instance is currently borrowed.
    pub(crate) fn set_activity(cell: &RefCell<Self>, activity: Activity) -> bool {
        let (event, listeners) = {
            let mut instance = cell.borrow_mut();

            if instance.activity == activity {
                return false;
            }

            instance.activity = activity;

            if activity == Activity::Inactive {
                instance.link = None;
            }

            (
                LifecycleEvent::new(instance.kind, instance.id),
                instance.notifier.snapshot(),
            )
        };

        for listener in listeners {
            match activity {
                Activity::Active => listener.on_activated(&event),
                Activity::Inactive => listener.on_deactivated(&event),
            }
        }

        true
    }

    /// Hands the instance out to a new owner: applies the placement, starts a new generation
    /// and only then activates the instance, so listeners never observe a stale placement.
    ///
    /// The instance must be inactive when this is called.
    ///
    /// Returns the new generation.
    pub(crate) fn claim(cell: &RefCell<Self>, placement: Placement) -> u64 {
        let generation = {
            let mut instance = cell.borrow_mut();

            debug_assert!(
                !instance.is_active(),
                "an instance must be deactivated before it is handed out again"
            );

            instance.placement = placement;

            // Wrapping would take more hand-outs than any program lives through.
            instance.generation = instance.generation.wrapping_add(1);
            instance.generation
        };

        Self::set_activity(cell, Activity::Active);

        generation
    }
}

impl<K: fmt::Debug, T> fmt::Debug for Instance<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field(
                "payload_type",
                &std::format_args!("{}", std::any::type_name::<T>()),
            )
            .field("activity", &self.activity)
            .field("placement", &self.placement)
            .field("generation", &self.generation)
            .field("link", &self.link)
            .field("notifier", &self.notifier)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::LifecycleListener;

    #[derive(Default)]
    struct Counter {
        activated: Cell<usize>,
        deactivated: Cell<usize>,
        last_position_on_activation: Cell<Option<Vec3>>,
        watched: RefCell<Option<InstanceCell<u8, &'static str>>>,
    }

    impl LifecycleListener<u8> for Counter {
        fn on_activated(&self, _event: &LifecycleEvent<u8>) {
            self.activated.set(self.activated.get() + 1);

            if let Some(cell) = self.watched.borrow().as_ref() {
                // The instance is no longer borrowed when listeners run.
                let position = cell.borrow().placement().position();
                self.last_position_on_activation.set(Some(position));
            }
        }

        fn on_deactivated(&self, _event: &LifecycleEvent<u8>) {
            self.deactivated.set(self.deactivated.get() + 1);
        }
    }

    fn instance_with_counter() -> (InstanceCell<u8, &'static str>, Rc<Counter>) {
        let cell = Rc::new(RefCell::new(Instance::new(1_u8, InstanceId::new(0), "rock")));
        let counter = Rc::new(Counter::default());

        let listener = Rc::clone(&counter);
        _ = cell.borrow_mut().notifier_mut().subscribe(listener);

        *counter.watched.borrow_mut() = Some(Rc::clone(&cell));

        (cell, counter)
    }

    #[test]
    fn new_instance_is_inactive() {
        let instance = Instance::new(1_u8, InstanceId::new(3), 42_u32);

        assert!(!instance.is_active());
        assert_eq!(instance.id().slot(), 3);
        assert_eq!(instance.kind(), 1);
        assert_eq!(*instance.payload(), 42);
        assert_eq!(instance.generation(), 0);
        assert_eq!(instance.placement(), Placement::IDENTITY);
    }

    #[test]
    fn transitions_notify_once() {
        let (cell, counter) = instance_with_counter();

        assert!(Instance::set_activity(&cell, Activity::Active));
        assert!(!Instance::set_activity(&cell, Activity::Active));
        assert_eq!(counter.activated.get(), 1);

        assert!(Instance::set_activity(&cell, Activity::Inactive));
        assert!(!Instance::set_activity(&cell, Activity::Inactive));
        assert_eq!(counter.deactivated.get(), 1);

        // Break the reference cycle between the listener and the instance.
        *counter.watched.borrow_mut() = None;
    }

    #[test]
    fn claim_places_before_activating() {
        let (cell, counter) = instance_with_counter();

        let generation = Instance::claim(&cell, Placement::at(Vec3::new(1.0, 2.0, 3.0)));

        assert_eq!(generation, 1);
        assert!(cell.borrow().is_active());
        assert_eq!(
            counter.last_position_on_activation.get(),
            Some(Vec3::new(1.0, 2.0, 3.0))
        );

        *counter.watched.borrow_mut() = None;
    }

    #[test]
    fn deactivation_stops_link() {
        let (cell, counter) = instance_with_counter();
        let anchor = Rc::new(crate::Anchor::new(Vec3::ZERO));

        _ = Instance::claim(&cell, Placement::IDENTITY);
        cell.borrow_mut().set_link(LinkerData::new(&anchor));
        assert!(cell.borrow().link().is_some());

        Instance::set_activity(&cell, Activity::Inactive);
        assert!(cell.borrow().link().is_none());
        assert!(!cell.borrow_mut().stop_link());

        *counter.watched.borrow_mut() = None;
    }

    #[test]
    fn payload_can_be_modified() {
        let mut instance = Instance::new(1_u8, InstanceId::new(0), 1_u32);

        *instance.payload_mut() += 1;
        instance.set_position(Vec3::X);
        instance.set_rotation(Quat::from_rotation_z(1.0));

        assert_eq!(*instance.payload(), 2);
        assert_eq!(instance.placement().position(), Vec3::X);
        assert_eq!(instance.placement().rotation(), Quat::from_rotation_z(1.0));
    }

    #[test]
    fn instance_id_displays_slot() {
        assert_eq!(InstanceId::new(12).to_string(), "#12");
    }
}
