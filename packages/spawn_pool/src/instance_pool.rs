use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::rc::Rc;

use tracing::debug;

use crate::{
    Instance, InstanceCell, InstanceId, LifecycleEvent, LifecycleListener, Membership,
    SubscriptionId,
};

/// All instances of one pool kind, plus the bookkeeping of which are in use.
///
/// Instances are kept in three views:
///
/// * `instances` is indexed by slot, in creation order. Instances are only ever appended.
/// * `ring` holds every slot once, front to back from least to most recently recycled. It
///   decides which instance to take over when the pool is exhausted.
/// * `membership` partitions the slots into active and inactive ones. It is updated only by
///   the lifecycle notifier of each instance, never directly by the pool.
///
/// Dropping the pool unsubscribes it from every instance, as handles may outlive the pool.
pub(crate) struct InstancePool<K, T> {
    kind: K,
    instances: Vec<InstanceCell<K, T>>,
    ring: VecDeque<usize>,
    membership: Rc<MembershipListener>,

    // Our subscription in each instance's notifier, indexed by slot.
    subscriptions: Vec<SubscriptionId>,
}

/// Receives lifecycle events of the instances of one kind and keeps the membership sets in
/// sync with them.
#[derive(Debug)]
struct MembershipListener {
    membership: RefCell<Membership>,
}

impl<K> LifecycleListener<K> for MembershipListener {
    fn on_activated(&self, event: &LifecycleEvent<K>) {
        self.membership
            .borrow_mut()
            .mark_active(event.instance().slot());
    }

    fn on_deactivated(&self, event: &LifecycleEvent<K>) {
        self.membership
            .borrow_mut()
            .mark_inactive(event.instance().slot());
    }
}

impl<K: Copy + Debug, T> InstancePool<K, T> {
    pub(crate) fn new(kind: K) -> Self {
        Self {
            kind,
            instances: Vec::new(),
            ring: VecDeque::new(),
            membership: Rc::new(MembershipListener {
                membership: RefCell::new(Membership::new()),
            }),
            subscriptions: Vec::new(),
        }
    }

    /// Number of instances ever created for this kind.
    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }

    /// Adds a new inactive instance at the back of the ring and returns its slot.
    pub(crate) fn push(&mut self, payload: T) -> usize {
        let slot = self.membership.membership.borrow_mut().push_inactive();

        debug_assert_eq!(slot, self.instances.len());

        let listener = Rc::clone(&self.membership);

        let mut instance = Instance::new(self.kind, InstanceId::new(slot), payload);
        let subscription = instance.notifier_mut().subscribe(listener);

        self.instances.push(Rc::new(RefCell::new(instance)));
        self.subscriptions.push(subscription);
        self.ring.push_back(slot);

        slot
    }

    /// # Panics
    ///
    /// Panics if there is no instance in the slot.
    pub(crate) fn instance(&self, slot: usize) -> &InstanceCell<K, T> {
        self.instances
            .get(slot)
            .expect("slots are only ever issued for instances that exist")
    }

    /// The oldest-created inactive instance, if any.
    pub(crate) fn next_inactive(&self) -> Option<usize> {
        self.membership.membership.borrow().next_inactive()
    }

    /// Moves the least recently recycled instance to the back of the ring and returns it.
    ///
    /// Returns `None` only if the pool has no instances at all.
    pub(crate) fn rotate_front(&mut self) -> Option<usize> {
        let slot = self.ring.pop_front()?;
        self.ring.push_back(slot);
        Some(slot)
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, slot: usize) -> bool {
        self.membership.membership.borrow().is_active(slot)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.membership.membership.borrow().active_count()
    }

    pub(crate) fn inactive_count(&self) -> usize {
        self.membership.membership.borrow().inactive_count()
    }

    pub(crate) fn active_slots(&self) -> Vec<usize> {
        self.membership.membership.borrow().active_slots()
    }

    pub(crate) fn inactive_slots(&self) -> Vec<usize> {
        self.membership.membership.borrow().inactive_slots()
    }

    pub(crate) fn ring(&self) -> impl Iterator<Item = usize> + '_ {
        self.ring.iter().copied()
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        let membership = self.membership.membership.borrow();
        membership.integrity_check();

        assert_eq!(
            membership.len(),
            self.instances.len(),
            "every instance must be tracked by the membership sets"
        );
        assert_eq!(
            self.ring.len(),
            self.instances.len(),
            "every instance must be in the ring exactly once"
        );

        let mut seen = vec![false; self.instances.len()];
        for &slot in &self.ring {
            let seen_slot = seen
                .get_mut(slot)
                .expect("ring must only contain slots of existing instances");
            assert!(!*seen_slot, "slot {slot} appears in the ring more than once");
            *seen_slot = true;
        }

        for (slot, cell) in self.instances.iter().enumerate() {
            let instance = cell.borrow();

            assert_eq!(instance.id().slot(), slot, "instance is stored in the wrong slot");
            assert_eq!(
                instance.is_active(),
                membership.is_active(slot),
                "membership of slot {slot} disagrees with the instance state"
            );
        }
    }
}

impl<K, T> Drop for InstancePool<K, T> {
    fn drop(&mut self) {
        let mut detached = 0_usize;

        for (cell, subscription) in self.instances.iter().zip(self.subscriptions.iter()) {
            // A caller may be holding a borrow of a payload while the pool goes away. The
            // subscription then stays behind, updating a membership nobody reads any more.
            if let Ok(mut instance) = cell.try_borrow_mut() {
                if instance.notifier_mut().unsubscribe(*subscription) {
                    detached = detached.wrapping_add(1);
                }
            }
        }

        debug!(
            instances = self.instances.len(),
            detached, "instance pool torn down"
        );
    }
}

impl<K: Debug, T> Debug for InstancePool<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstancePool")
            .field("kind", &self.kind)
            .field("len", &self.instances.len())
            .field("ring", &self.ring)
            .field("membership", &self.membership.membership)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{Activity, Placement};

    fn pool_of(count: usize) -> InstancePool<u8, usize> {
        let mut pool = InstancePool::new(4_u8);
        for payload in 0..count {
            _ = pool.push(payload);
        }
        pool
    }

    #[test]
    fn pushed_instances_are_inactive_in_ring_order() {
        let pool = pool_of(3);

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.next_inactive(), Some(0));
        assert_eq!(pool.inactive_count(), 3);
        assert_eq!(pool.ring().collect::<Vec<_>>(), vec![0, 1, 2]);
        pool.integrity_check();
    }

    #[test]
    fn membership_follows_instance_transitions() {
        let pool = pool_of(3);

        _ = Instance::claim(pool.instance(1), Placement::IDENTITY);

        assert!(pool.is_active(1));
        assert_eq!(pool.active_slots(), vec![1]);
        assert_eq!(pool.inactive_slots(), vec![0, 2]);
        assert_eq!(pool.next_inactive(), Some(0));
        pool.integrity_check();

        Instance::set_activity(pool.instance(1), Activity::Inactive);

        assert!(!pool.is_active(1));
        assert_eq!(pool.active_count(), 0);
        pool.integrity_check();
    }

    #[test]
    fn rotate_front_cycles_through_ring() {
        let mut pool = pool_of(3);

        assert_eq!(pool.rotate_front(), Some(0));
        assert_eq!(pool.rotate_front(), Some(1));
        assert_eq!(pool.ring().collect::<Vec<_>>(), vec![2, 0, 1]);
        pool.integrity_check();
    }

    #[test]
    fn rotate_front_of_empty_pool_is_none() {
        let mut pool = InstancePool::<u8, usize>::new(0);

        assert_eq!(pool.rotate_front(), None);
    }

    #[test]
    fn drop_detaches_from_instances() {
        let pool = pool_of(2);
        let survivor = Rc::clone(pool.instance(0));

        assert_eq!(survivor.borrow_mut().notifier_mut().len(), 1);

        drop(pool);

        assert_eq!(survivor.borrow_mut().notifier_mut().len(), 0);

        // Transitions after teardown go nowhere but still work.
        assert!(Instance::set_activity(&survivor, Activity::Active));
    }
}
