//! Registry-side metric primitives.
//!
//! Each primitive is a cheap clonable handle over shared state; clones observe and mutate the same
//! series. State is keyed by the label set itself, with the empty set addressing the unlabeled
//! instance.
mod counter;
pub use counter::Counter;

mod gauge;
pub use gauge::Gauge;

mod histogram;
pub use histogram::Histogram;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use metra_model::Labels;

/// Per-label-combination storage shared by all primitives.
#[derive(Debug)]
pub(crate) struct Series<T> {
    unlabeled: Option<T>,
    labeled: BTreeMap<Labels, T>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self {
            unlabeled: None,
            labeled: BTreeMap::new(),
        }
    }
}

impl<T> Series<T> {
    pub(crate) fn entry(&mut self, labels: &Labels, init: impl FnOnce() -> T) -> &mut T {
        if labels.is_empty() {
            return self.unlabeled.get_or_insert_with(init);
        }
        self.labeled.entry(labels.clone()).or_insert_with(init)
    }

    pub(crate) fn get(&self, labels: &Labels) -> Option<&T> {
        if labels.is_empty() {
            return self.unlabeled.as_ref();
        }
        self.labeled.get(labels)
    }

    pub(crate) fn clear(&mut self) {
        self.unlabeled = None;
        self.labeled.clear();
    }

    /// Visit every series in label order.
    ///
    /// A metric that never saw a write still yields its unlabeled instance with `empty()`, so
    /// freshly registered metrics show up in snapshots.
    pub(crate) fn visit(&self, empty: impl FnOnce() -> T, mut f: impl FnMut(&Labels, &T)) {
        match &self.unlabeled {
            Some(v) => f(&Labels::new(), v),
            None if self.labeled.is_empty() => f(&Labels::new(), &empty()),
            None => {}
        }
        for (labels, v) in &self.labeled {
            f(labels, v);
        }
    }
}

#[inline]
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
