//! Change notification for store tables.
//!
//! Readers register a callback for the tables they render from; the store
//! calls [`InvalidationTracker::notify`] after every committed write. The
//! returned [`Subscription`] unregisters the callback when dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    CachedArticles,
    PageKeys,
    Bookmarks,
    Preferences,
}

pub type ChangeCallback = Arc<dyn Fn(Table) + Send + Sync>;

struct Observer {
    tables: Vec<Table>,
    callback: ChangeCallback,
}

#[derive(Default)]
pub struct InvalidationTracker {
    observers: Mutex<HashMap<u64, Observer>>,
    next_id: AtomicU64,
}

impl InvalidationTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, tables: &[Table], callback: ChangeCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Observer {
                    tables: tables.to_vec(),
                    callback,
                },
            );

        Subscription {
            id,
            tracker: Arc::downgrade(self),
        }
    }

    /// Invoke every observer watching one of `tables`, once per observer.
    ///
    /// Callbacks run outside the registry lock so they may query the store
    /// or register further observers.
    pub fn notify(&self, tables: &[Table]) {
        let matched: Vec<(Table, ChangeCallback)> = {
            let observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers
                .values()
                .filter_map(|o| {
                    tables
                        .iter()
                        .find(|t| o.tables.contains(t))
                        .map(|t| (*t, Arc::clone(&o.callback)))
                })
                .collect()
        };

        trace!("Notifying {} observers of {:?}", matched.len(), tables);
        for (table, callback) in matched {
            callback(table);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn unsubscribe(&self, id: u64) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Registration handle. Dropping it stops further callbacks.
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    tracker: Weak<InvalidationTracker>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.unsubscribe(self.id);
        }
    }
}
