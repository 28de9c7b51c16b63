use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// Values stored in a [`KeyedStore`] know how to absorb a partial update.
pub trait ShallowMerge {
    type Patch;

    fn apply_patch(&mut self, patch: Self::Patch);
}

/// Full id → value mapping as observed after a mutation.
pub type Mapping<V> = Arc<BTreeMap<String, V>>;

#[derive(Clone, Debug, Default, Serialize)]
pub struct KeyedStoreStats {
    pub registers: u64,
    pub unregisters: u64,
    pub updates: u64,
    pub missed_updates: u64,
}

/// Generic registry of string keys to values.
///
/// Every mutation returns the new full mapping. Readers that want to react to
/// changes hold a `watch::Receiver` from [`KeyedStore::subscribe`].
pub struct KeyedStore<V> {
    entries: RwLock<Mapping<V>>,
    watch_tx: watch::Sender<Mapping<V>>,
    stats: Mutex<KeyedStoreStats>,
}

impl<V> KeyedStore<V>
where
    V: Clone + ShallowMerge,
{
    pub fn new() -> Self {
        let initial: Mapping<V> = Arc::new(BTreeMap::new());
        let (watch_tx, _rx) = watch::channel(Arc::clone(&initial));
        Self {
            entries: RwLock::new(initial),
            watch_tx,
            stats: Mutex::new(KeyedStoreStats::default()),
        }
    }

    /// Inserts or replaces the value for `id`.
    pub fn register(&self, id: impl Into<String>, value: V) -> Mapping<V> {
        let id = id.into();
        debug!(id = %id, "keyed store register");
        self.stats.lock().registers += 1;
        self.mutate(|map| {
            map.insert(id, value);
            true
        })
    }

    /// Removes `id`; unchanged mapping if it was absent.
    pub fn unregister(&self, id: &str) -> Mapping<V> {
        debug!(id, "keyed store unregister");
        let mapping = self.mutate(|map| map.remove(id).is_some());
        self.stats.lock().unregisters += 1;
        mapping
    }

    /// Shallow-merges `patch` onto the existing value. Missing ids are a no-op.
    pub fn update(&self, id: &str, patch: V::Patch) -> Mapping<V> {
        self.update_with(id, |value| value.apply_patch(patch))
    }

    /// Applies `f` to the existing value. Missing ids are a no-op.
    pub fn update_with<F>(&self, id: &str, f: F) -> Mapping<V>
    where
        F: FnOnce(&mut V),
    {
        let mut hit = false;
        let mapping = self.mutate(|map| match map.get_mut(id) {
            Some(value) => {
                f(value);
                hit = true;
                true
            }
            None => false,
        });
        let mut stats = self.stats.lock();
        if hit {
            stats.updates += 1;
        } else {
            stats.missed_updates += 1;
            debug!(id, "keyed store update ignored for unknown id");
        }
        mapping
    }

    pub fn get(&self, id: &str) -> Option<V> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn snapshot(&self) -> Mapping<V> {
        Arc::clone(&self.entries.read())
    }

    pub fn subscribe(&self) -> watch::Receiver<Mapping<V>> {
        self.watch_tx.subscribe()
    }

    pub fn stats(&self) -> KeyedStoreStats {
        self.stats.lock().clone()
    }

    fn mutate<F>(&self, f: F) -> Mapping<V>
    where
        F: FnOnce(&mut BTreeMap<String, V>) -> bool,
    {
        let mut guard = self.entries.write();
        let mut next = BTreeMap::clone(&guard);
        if !f(&mut next) {
            return Arc::clone(&guard);
        }
        let mapping = Arc::new(next);
        *guard = Arc::clone(&mapping);
        drop(guard);
        self.watch_tx.send_replace(Arc::clone(&mapping));
        mapping
    }
}

impl<V> Default for KeyedStore<V>
where
    V: Clone + ShallowMerge,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        label: String,
        hits: u32,
    }

    struct CounterPatch {
        label: Option<String>,
        hits: Option<u32>,
    }

    impl ShallowMerge for Counter {
        type Patch = CounterPatch;

        fn apply_patch(&mut self, patch: CounterPatch) {
            if let Some(label) = patch.label {
                self.label = label;
            }
            if let Some(hits) = patch.hits {
                self.hits = hits;
            }
        }
    }

    fn counter(label: &str) -> Counter {
        Counter {
            label: label.into(),
            hits: 0,
        }
    }

    #[test]
    fn register_replaces_and_unregister_removes() {
        let store = KeyedStore::new();
        store.register("a", counter("first"));
        let mapping = store.register("a", counter("second"));
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["a"].label, "second");

        let mapping = store.unregister("a");
        assert!(mapping.is_empty());
        assert!(!store.contains("a"));
    }

    #[test]
    fn update_merges_only_supplied_fields() {
        let store = KeyedStore::new();
        store.register("a", counter("keep"));
        let mapping = store.update(
            "a",
            CounterPatch {
                label: None,
                hits: Some(3),
            },
        );
        assert_eq!(
            mapping["a"],
            Counter {
                label: "keep".into(),
                hits: 3
            }
        );
    }

    #[test]
    fn update_of_missing_id_is_a_noop() {
        let store = KeyedStore::new();
        store.register("a", counter("a"));
        let before = store.snapshot();
        let after = store.update(
            "ghost",
            CounterPatch {
                label: Some("x".into()),
                hits: None,
            },
        );
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(store.stats().missed_updates, 1);
        assert!(!store.contains("ghost"));
    }

    #[test]
    fn watchers_observe_effective_mutations_only() {
        let store: KeyedStore<Counter> = KeyedStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.unregister("missing");
        assert!(!rx.has_changed().unwrap());

        store.register("a", counter("a"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
