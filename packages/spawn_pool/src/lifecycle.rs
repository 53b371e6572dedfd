use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::InstanceId;

/// Observes activity transitions of pooled instances.
///
/// Every instance carries a lifecycle notifier that calls its listeners whenever the instance
/// becomes active or inactive, no matter what caused the transition: a spawn, a bulk reclaim
/// or a caller toggling the instance through its handle. The pool keeps its own membership
/// bookkeeping up to date through exactly this channel.
///
/// Listeners are called synchronously on the owning thread, after the instance state has
/// already changed and after all borrows of the instance have been released. A listener
/// must not spawn or disable instances of the same pool kind.
///
/// Both methods default to doing nothing, so a listener only needs to implement the
/// transitions it cares about.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
///
/// use spawn_pool::{LifecycleEvent, LifecycleListener};
///
/// #[derive(Default)]
/// struct ActivationCounter {
///     activations: Cell<usize>,
/// }
///
/// impl<K> LifecycleListener<K> for ActivationCounter {
///     fn on_activated(&self, _event: &LifecycleEvent<K>) {
///         self.activations.set(self.activations.get() + 1);
///     }
/// }
/// ```
pub trait LifecycleListener<K> {
    /// Called after an instance has become active.
    fn on_activated(&self, event: &LifecycleEvent<K>) {
        _ = event;
    }

    /// Called after an instance has become inactive.
    fn on_deactivated(&self, event: &LifecycleEvent<K>) {
        _ = event;
    }
}

/// Identifies the instance that a [`LifecycleListener`] is being notified about.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LifecycleEvent<K> {
    kind: K,
    instance: InstanceId,
}

impl<K> LifecycleEvent<K> {
    pub(crate) fn new(kind: K, instance: InstanceId) -> Self {
        Self { kind, instance }
    }

    /// The instance that changed state.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }
}

impl<K: Copy> LifecycleEvent<K> {
    /// The pool kind the instance belongs to.
    #[must_use]
    pub fn kind(&self) -> K {
        self.kind
    }
}

/// Identifies one listener subscription on one instance, for later unsubscribing.
///
/// IDs are unique across all instances in the process, so an ID issued by one instance never
/// matches a subscription on another.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        // Relaxed is enough, we only need every value to be handed out once.
        // Wrapping would take more subscriptions than any process lives through.
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(0);

/// The per-instance list of lifecycle listeners.
pub(crate) struct LifecycleNotifier<K> {
    listeners: Vec<(SubscriptionId, Rc<dyn LifecycleListener<K>>)>,
}

impl<K> LifecycleNotifier<K> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, listener: Rc<dyn LifecycleListener<K>>) -> SubscriptionId {
        let id = SubscriptionId::next();

        self.listeners.push((id, listener));
        id
    }

    /// Returns whether a subscription with this ID existed.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(position) = self.listeners.iter().position(|(existing, _)| *existing == id)
        else {
            return false;
        };

        self.listeners.remove(position);
        true
    }

    /// Listeners to call for a transition. We hand out a copy so the instance does not
    /// need to stay borrowed while the listeners run.
    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn LifecycleListener<K>>> {
        self.listeners
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<K> fmt::Debug for LifecycleNotifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleNotifier")
            .field("listener_count", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
