//! Observer list with unsubscribe handles.

use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

struct ObserverList<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
    /// Ids taken out of `entries` by a running `notify`.
    dispatching: Vec<u64>,
    /// Ids unsubscribed while their callback was out for dispatch.
    removed: Vec<u64>,
}

impl<T> ObserverList<T> {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        if self.entries.len() != before {
            return true;
        }
        if self.dispatching.contains(&id) && !self.removed.contains(&id) {
            self.removed.push(id);
            return true;
        }
        false
    }
}

/// Subscribers to engine updates.
pub struct Observers<T> {
    inner: Arc<Mutex<ObserverList<T>>>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ObserverList {
                next_id: 0,
                entries: Vec::new(),
                dispatching: Vec::new(),
                removed: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> Observers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`; it runs for every update until the returned
    /// subscription is unsubscribed.
    pub fn subscribe(&self, callback: impl FnMut(&T) + Send + 'static) -> Subscription {
        let mut list = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        list.next_id += 1;
        let id = list.next_id;
        list.entries.push((id, Box::new(callback)));

        let weak: Weak<Mutex<ObserverList<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            remove: Box::new(move |id| {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                let mut list = inner.lock().unwrap_or_else(|e| e.into_inner());
                list.remove(id)
            }),
        }
    }

    /// Calls every subscriber with `update`.
    ///
    /// The lock is released while callbacks run, so a callback may
    /// subscribe or unsubscribe (itself included). An update sent while
    /// another is being dispatched is dropped.
    pub fn notify(&self, update: &T) {
        let mut taken = {
            let mut list = self.lock();
            if !list.dispatching.is_empty() {
                return;
            }
            let taken = std::mem::take(&mut list.entries);
            list.dispatching = taken.iter().map(|(id, _)| *id).collect();
            taken
        };

        for (id, callback) in taken.iter_mut() {
            if self.lock().removed.contains(&*id) {
                continue;
            }
            callback(update);
        }

        let mut list = self.lock();
        let removed = std::mem::take(&mut list.removed);
        taken.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::replace(&mut list.entries, taken);
        list.entries.extend(added);
        list.dispatching.clear();
    }

    pub fn len(&self) -> usize {
        let list = self.lock();
        list.entries.len() + list.dispatching.len() - list.removed.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObserverList<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`Observers::subscribe`].
///
/// Dropping it keeps the subscription alive; call
/// [`unsubscribe`](Self::unsubscribe) to remove the callback.
pub struct Subscription {
    id: u64,
    remove: Box<dyn FnOnce(u64) -> bool + Send>,
}

impl Subscription {
    /// Removes the callback. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        (self.remove)(self.id)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
