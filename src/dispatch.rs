//! Ordered multi-subscriber dispatch
//!
//! Listeners are invoked in subscription order; a panicking listener is
//! logged and skipped so it cannot block delivery to the rest.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by [`Listeners::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// An ordered registry of event listeners
pub struct Listeners<E> {
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
    next_id: AtomicU64,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Listeners<E> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a listener; returns the id needed to unsubscribe
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; unknown ids are ignored
    pub fn unsubscribe(&self, id: ListenerId) {
        self.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listeners are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invoke every listener with `event`, in subscription order
    ///
    /// The registry lock is not held during callbacks, so listeners may
    /// subscribe or unsubscribe reentrantly.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!("listener panicked during dispatch, skipping");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Callback<E>)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_in_subscription_order() {
        let listeners: Listeners<u32> = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            listeners.subscribe(move |value: &u32| {
                seen.lock().unwrap().push(format!("{tag}:{value}"));
            });
        }

        listeners.emit(&7);
        assert_eq!(&*seen.lock().unwrap(), &["a:7", "b:7", "c:7"]);
    }

    #[test]
    fn panicking_listener_does_not_block_the_rest() {
        let listeners: Listeners<()> = Listeners::new();
        let reached = Arc::new(Mutex::new(false));

        listeners.subscribe(|(): &()| panic!("boom"));
        {
            let reached = Arc::clone(&reached);
            listeners.subscribe(move |(): &()| *reached.lock().unwrap() = true);
        }

        listeners.emit(&());
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let listeners: Listeners<()> = Listeners::new();
        let count = Arc::new(AtomicU64::new(0));

        let id = {
            let count = Arc::clone(&count);
            listeners.subscribe(move |(): &()| {
                count.fetch_add(1, Ordering::Relaxed);
            })
        };
        {
            let count = Arc::clone(&count);
            listeners.subscribe(move |(): &()| {
                count.fetch_add(10, Ordering::Relaxed);
            });
        }

        listeners.unsubscribe(id);
        listeners.unsubscribe(id); // second removal is a no-op
        listeners.emit(&());
        assert_eq!(count.load(Ordering::Relaxed), 10);
        assert_eq!(listeners.len(), 1);
    }
}
