use bitvec::vec::BitVec;

/// Tracks which instances of one pool kind are active and which are inactive.
///
/// Instances are identified by their slot, the index at which they were created. The two
/// sets always partition the full range of slots: every slot is in exactly one of them.
///
/// # Picking an inactive instance
///
/// When reusing an instance, we hand out the oldest-created inactive one, i.e. the one with
/// the lowest slot. To make this cheap we cache the lowest inactive slot, the same way a
/// vacancy tracker remembers the lowest-index slab with a free slot. The cache is updated
/// on every transition, so it is always exact, never a hint.
///
/// Deactivating a slot and reusing the cached slot cost O(1). Activating the cached slot
/// scans forward for the next inactive one, which costs one word check per 64 slots between
/// the two.
#[derive(Debug)]
pub(crate) struct Membership {
    // Slot index to "is active".
    active: BitVec,

    // Slot index to "is inactive".
    inactive: BitVec,

    // Lowest slot in the inactive set, if any.
    next_inactive: Option<usize>,
}

impl Membership {
    pub(crate) fn new() -> Self {
        Self {
            active: BitVec::new(),
            inactive: BitVec::new(),
            next_inactive: None,
        }
    }

    /// Number of slots tracked, active or not.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    /// Starts tracking a newly created instance, which is always inactive at creation.
    ///
    /// Returns the slot assigned to the instance.
    pub(crate) fn push_inactive(&mut self) -> usize {
        let slot = self.active.len();

        self.active.push(false);
        self.inactive.push(true);

        // Any existing inactive slot has a lower index than a new one.
        if self.next_inactive.is_none() {
            self.next_inactive = Some(slot);
        }

        slot
    }

    /// The lowest inactive slot, if any slot is inactive.
    pub(crate) fn next_inactive(&self) -> Option<usize> {
        self.next_inactive
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, slot: usize) -> bool {
        self.active.get(slot).is_some_and(|bit| *bit)
    }

    /// Moves a slot from the inactive set to the active set.
    ///
    /// Does nothing if the slot is already active.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not tracked.
    pub(crate) fn mark_active(&mut self, slot: usize) {
        if !self.inactive.replace(slot, false) {
            return;
        }

        self.active.set(slot, true);

        if self.next_inactive == Some(slot) {
            // Any other inactive slot is after this one, as this one was the lowest.
            // Will not wrap because wrapping implies more slots than virtual memory.
            let remaining_start = slot.wrapping_add(1);

            self.next_inactive = self
                .inactive
                .get(remaining_start..)
                .and_then(|remaining| remaining.first_one())
                .map(|index_in_remaining| remaining_start.wrapping_add(index_in_remaining));
        }
    }

    /// Moves a slot from the active set to the inactive set.
    ///
    /// Does nothing if the slot is already inactive.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not tracked.
    pub(crate) fn mark_inactive(&mut self, slot: usize) {
        if !self.active.replace(slot, false) {
            return;
        }

        self.inactive.set(slot, true);

        if self.next_inactive.is_none_or(|current| slot < current) {
            self.next_inactive = Some(slot);
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.count_ones()
    }

    pub(crate) fn inactive_count(&self) -> usize {
        self.inactive.count_ones()
    }

    /// Active slots in ascending order. This is a snapshot, so callers may deactivate
    /// instances while iterating over it.
    pub(crate) fn active_slots(&self) -> Vec<usize> {
        self.active.iter_ones().collect()
    }

    /// Inactive slots in ascending order.
    pub(crate) fn inactive_slots(&self) -> Vec<usize> {
        self.inactive.iter_ones().collect()
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        assert_eq!(
            self.active.len(),
            self.inactive.len(),
            "active and inactive sets must track the same slots"
        );

        for (slot, (active, inactive)) in self.active.iter().zip(self.inactive.iter()).enumerate()
        {
            assert!(
                *active != *inactive,
                "slot {slot} must be in exactly one of the active and inactive sets"
            );
        }

        assert_eq!(
            self.next_inactive,
            self.inactive.first_one(),
            "cached lowest inactive slot is out of date"
        );
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn empty_membership_has_no_inactive() {
        let membership = Membership::new();

        assert_eq!(membership.len(), 0);
        assert_eq!(membership.next_inactive(), None);
        membership.integrity_check();
    }

    #[test]
    fn new_slots_are_inactive_in_creation_order() {
        let mut membership = Membership::new();

        assert_eq!(membership.push_inactive(), 0);
        assert_eq!(membership.push_inactive(), 1);
        assert_eq!(membership.push_inactive(), 2);

        assert_eq!(membership.next_inactive(), Some(0));
        assert_eq!(membership.inactive_count(), 3);
        assert_eq!(membership.active_count(), 0);
        membership.integrity_check();
    }

    #[test]
    fn activating_lowest_moves_cache_forward() {
        let mut membership = Membership::new();
        for _ in 0..3 {
            _ = membership.push_inactive();
        }

        membership.mark_active(0);
        assert_eq!(membership.next_inactive(), Some(1));

        membership.mark_active(1);
        assert_eq!(membership.next_inactive(), Some(2));

        membership.mark_active(2);
        assert_eq!(membership.next_inactive(), None);

        assert_eq!(membership.active_slots(), vec![0, 1, 2]);
        assert!(membership.inactive_slots().is_empty());
        membership.integrity_check();
    }

    #[test]
    fn activating_out_of_order_keeps_lowest() {
        let mut membership = Membership::new();
        for _ in 0..4 {
            _ = membership.push_inactive();
        }

        membership.mark_active(2);
        assert_eq!(membership.next_inactive(), Some(0));

        membership.mark_active(0);
        assert_eq!(membership.next_inactive(), Some(1));

        membership.mark_active(1);
        assert_eq!(membership.next_inactive(), Some(3));
        membership.integrity_check();
    }

    #[test]
    fn deactivating_lower_slot_moves_cache_back() {
        let mut membership = Membership::new();
        for _ in 0..4 {
            _ = membership.push_inactive();
        }
        for slot in 0..4 {
            membership.mark_active(slot);
        }

        membership.mark_inactive(3);
        assert_eq!(membership.next_inactive(), Some(3));

        membership.mark_inactive(1);
        assert_eq!(membership.next_inactive(), Some(1));

        membership.mark_inactive(2);
        assert_eq!(membership.next_inactive(), Some(1));

        assert_eq!(membership.inactive_slots(), vec![1, 2, 3]);
        assert!(membership.is_active(0));
        assert!(!membership.is_active(1));
        membership.integrity_check();
    }

    #[test]
    fn repeated_transitions_are_no_ops() {
        let mut membership = Membership::new();
        _ = membership.push_inactive();
        _ = membership.push_inactive();

        membership.mark_inactive(0);
        assert_eq!(membership.inactive_count(), 2);

        membership.mark_active(1);
        membership.mark_active(1);
        assert_eq!(membership.active_count(), 1);
        assert_eq!(membership.next_inactive(), Some(0));
        membership.integrity_check();
    }

    #[test]
    fn push_after_all_active_becomes_next_inactive() {
        let mut membership = Membership::new();
        _ = membership.push_inactive();
        membership.mark_active(0);
        assert_eq!(membership.next_inactive(), None);

        let slot = membership.push_inactive();
        assert_eq!(slot, 1);
        assert_eq!(membership.next_inactive(), Some(1));
        membership.integrity_check();
    }

    #[test]
    fn cycling_lowest_slot_keeps_cache_exact() {
        let mut membership = Membership::new();
        for _ in 0..200 {
            _ = membership.push_inactive();
        }
        for slot in 0..199 {
            membership.mark_active(slot);
        }
        assert_eq!(membership.next_inactive(), Some(199));

        for _ in 0..3 {
            membership.mark_inactive(0);
            assert_eq!(membership.next_inactive(), Some(0));

            membership.mark_active(0);
            assert_eq!(membership.next_inactive(), Some(199));
        }

        membership.integrity_check();
    }

    #[test]
    fn unknown_slot_is_not_active() {
        let membership = Membership::new();

        assert!(!membership.is_active(99));
    }

    #[test]
    #[should_panic]
    fn marking_untracked_slot_panics() {
        let mut membership = Membership::new();

        membership.mark_active(0);
    }
}
