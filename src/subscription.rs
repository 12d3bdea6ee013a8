use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::engine::panic_message;
use crate::Version;

pub type SubscriptionId = u64;

pub(crate) type Observer<State> = Box<dyn Fn(&Arc<State>) + Send + Sync>;

struct Entry<State> {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    observer: Observer<State>,
}

trait Registry: Send + Sync {
    fn remove(&self, id: SubscriptionId);
}

/// Observers of committed state versions, notified in subscription order.
pub(crate) struct Subscribers<State> {
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Entry<State>>>>,
}

impl<State> Default for Subscribers<State> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<State> Subscribers<State>
where
    State: Send + Sync + 'static,
{
    pub(crate) fn subscribe(self: &Arc<Self>, observer: Observer<State>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.entries.lock().push(Arc::new(Entry {
            id,
            active: active.clone(),
            observer,
        }));
        log::trace!("subscriber {} registered", id);

        let registry: Weak<dyn Registry> = Arc::downgrade(self) as Weak<dyn Registry>;
        Subscription {
            id,
            active,
            registry,
            detached: false,
        }
    }

    /// Delivers `state` to every observer that is still registered.
    ///
    /// Works on a snapshot so observers may subscribe or unsubscribe from inside their callback.
    /// An observer deactivated mid-loop is skipped for the rest of it.
    pub(crate) fn notify(&self, state: &Arc<State>, version: Version) {
        let snapshot: Vec<Arc<Entry<State>>> = self.entries.lock().clone();
        for entry in snapshot {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| (entry.observer)(state)));
            if let Err(payload) = result {
                log::error!(
                    "subscriber {} panicked on version {}: {}",
                    entry.id,
                    version,
                    panic_message(&*payload)
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<State> Registry for Subscribers<State>
where
    State: Send + Sync + 'static,
{
    fn remove(&self, id: SubscriptionId) {
        self.entries.lock().retain(|entry| entry.id != id);
        log::trace!("subscriber {} removed", id);
    }
}

/// Handle to a registered observer.
///
/// Dropping the handle unsubscribes. Call [`Subscription::detach`] to keep the observer registered
/// for the lifetime of the store instead.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    registry: Weak<dyn Registry>,
    detached: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stops delivery. Safe to call more than once and from inside the observer itself.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
