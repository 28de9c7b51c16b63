use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use paneldeck_durable_cache::{DurableCache, SaveOptions, StorageKeys};

use crate::errors::FilterError;
use crate::model::{FilterConfig, FilterConfigPatch, FilterSet};

#[derive(Default)]
struct FilterState {
    active: FilterSet,
    presets: Vec<FilterConfig>,
}

/// Owns the canonical active filter set and the saved presets.
///
/// Every mutation persists through the durable cache; persistence failures
/// are absorbed there, so in-memory state is always authoritative.
pub struct FilterCenter {
    cache: Arc<DurableCache>,
    keys: StorageKeys,
    state: RwLock<FilterState>,
    watch_tx: watch::Sender<Arc<FilterSet>>,
}

impl FilterCenter {
    /// Seeds active filters and presets from the cache; empty when absent.
    pub fn open(cache: Arc<DurableCache>, keys: StorageKeys) -> Self {
        let active = Self::load_active(&cache, &keys);
        let presets = Self::load_presets(&cache, &keys);
        info!(
            domains = active.len(),
            presets = presets.len(),
            "filter center initialised"
        );
        let (watch_tx, _rx) = watch::channel(Arc::new(active.clone()));
        Self {
            cache,
            keys,
            state: RwLock::new(FilterState { active, presets }),
            watch_tx,
        }
    }

    pub fn active_filters(&self) -> FilterSet {
        self.state.read().active.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FilterSet>> {
        self.watch_tx.subscribe()
    }

    /// Replaces the active set wholesale.
    pub fn apply_filters(&self, filters: FilterSet) -> FilterSet {
        self.commit_active(|active| *active = filters)
    }

    /// Layers `filters` on top of the active set, domain by domain.
    pub fn merge_filters(&self, filters: &FilterSet) -> FilterSet {
        self.commit_active(|active| active.merge(filters))
    }

    /// Resets to `{}` and writes the empty set explicitly.
    pub fn clear_filters(&self) -> FilterSet {
        self.commit_active(|active| *active = FilterSet::new())
    }

    pub fn remove_domain(&self, domain: &str) -> FilterSet {
        self.commit_active(|active| {
            active.remove_domain(domain);
        })
    }

    pub fn presets(&self) -> Vec<FilterConfig> {
        self.state.read().presets.clone()
    }

    pub fn preset(&self, id: &str) -> Option<FilterConfig> {
        self.state
            .read()
            .presets
            .iter()
            .find(|preset| preset.id == id)
            .cloned()
    }

    /// Stores a new preset. Blank names are refused so the collection never
    /// gains a preset that could not be loaded later.
    pub fn save_filter(
        &self,
        name: &str,
        filters: FilterSet,
        description: Option<String>,
    ) -> Result<FilterConfig, FilterError> {
        let preset = FilterConfig::new(generate_preset_id(), name.trim(), filters, description);
        preset.validate()?;
        self.commit_presets(|presets| {
            presets.push(preset.clone());
            true
        });
        info!(id = %preset.id, name = %preset.name, "filter preset saved");
        Ok(preset)
    }

    /// Removes a preset; returns false (and writes nothing) if it was absent.
    pub fn delete_filter(&self, id: &str) -> bool {
        let removed = self.commit_presets(|presets| {
            let before = presets.len();
            presets.retain(|preset| preset.id != id);
            presets.len() != before
        });
        if removed {
            info!(id, "filter preset deleted");
        } else {
            debug!(id, "delete of unknown filter preset ignored");
        }
        removed
    }

    /// Applies a preset's filters. Missing or malformed presets are refused
    /// and the active set is left as it was.
    pub fn load_filter(&self, id: &str) -> Result<FilterSet, FilterError> {
        let preset = self
            .preset(id)
            .ok_or_else(|| FilterError::NotFound(id.to_string()))?;
        let filters = preset.filter_set().map_err(|err| {
            warn!(id, error = %err, "refusing to apply invalid filter preset");
            err
        })?;
        Ok(self.apply_filters(filters))
    }

    pub fn update_filter(
        &self,
        id: &str,
        patch: FilterConfigPatch,
    ) -> Result<FilterConfig, FilterError> {
        let mut updated: Option<Result<FilterConfig, FilterError>> = None;
        self.commit_presets(|presets| {
            let Some(preset) = presets.iter_mut().find(|preset| preset.id == id) else {
                return false;
            };
            let mut next = preset.clone();
            if let Some(name) = patch.name {
                next.name = name.trim().to_string();
            }
            if let Some(description) = patch.description {
                next.description = Some(description);
            }
            if let Some(filters) = patch.filters {
                next.filters = filters.into();
            }
            if let Err(err) = next.validate() {
                updated = Some(Err(err));
                return false;
            }
            next.version = next.version.saturating_add(1);
            next.updated_at = Utc::now();
            *preset = next.clone();
            updated = Some(Ok(next));
            true
        });
        updated.unwrap_or_else(|| Err(FilterError::NotFound(id.to_string())))
    }

    /// Marks `id` as the only default preset.
    pub fn set_default_filter(&self, id: &str) -> Result<FilterConfig, FilterError> {
        let mut chosen: Option<FilterConfig> = None;
        self.commit_presets(|presets| {
            if !presets.iter().any(|preset| preset.id == id) {
                return false;
            }
            let now = Utc::now();
            for preset in presets.iter_mut() {
                let should_be_default = preset.id == id;
                if preset.is_default != should_be_default {
                    preset.is_default = should_be_default;
                    preset.version = preset.version.saturating_add(1);
                    preset.updated_at = now;
                }
                if should_be_default {
                    chosen = Some(preset.clone());
                }
            }
            true
        });
        chosen.ok_or_else(|| FilterError::NotFound(id.to_string()))
    }

    pub fn default_filter(&self) -> Option<FilterConfig> {
        self.state
            .read()
            .presets
            .iter()
            .find(|preset| preset.is_default && preset.is_valid())
            .cloned()
    }

    /// Applies the default preset, if a valid one exists.
    pub fn apply_default_filter(&self) -> Option<FilterSet> {
        let preset = self.default_filter()?;
        self.load_filter(&preset.id).ok()
    }

    fn commit_active<F>(&self, mutate: F) -> FilterSet
    where
        F: FnOnce(&mut FilterSet),
    {
        let next = {
            let mut state = self.state.write();
            mutate(&mut state.active);
            state.active.clone()
        };
        self.cache
            .save(&self.keys.active_filters(), &next, SaveOptions::default());
        self.watch_tx.send_replace(Arc::new(next.clone()));
        debug!(domains = next.len(), "active filters committed");
        next
    }

    /// Runs `mutate` on the preset list and persists it when it reports a change.
    fn commit_presets<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut Vec<FilterConfig>) -> bool,
    {
        let snapshot = {
            let mut state = self.state.write();
            if !mutate(&mut state.presets) {
                return false;
            }
            state.presets.clone()
        };
        self.cache
            .save(&self.keys.filter_presets(), &snapshot, SaveOptions::default());
        true
    }

    fn load_active(cache: &DurableCache, keys: &StorageKeys) -> FilterSet {
        match cache.load::<Value>(&keys.active_filters()) {
            Some(value) => FilterSet::try_from(value).unwrap_or_else(|err| {
                warn!(error = %err, "stored active filters ignored");
                FilterSet::new()
            }),
            None => FilterSet::new(),
        }
    }

    fn load_presets(cache: &DurableCache, keys: &StorageKeys) -> Vec<FilterConfig> {
        let Some(raw) = cache.load::<Vec<Value>>(&keys.filter_presets()) else {
            return Vec::new();
        };
        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<FilterConfig>(value) {
                Ok(preset) => Some(preset),
                Err(err) => {
                    warn!(error = %err, "unreadable filter preset dropped");
                    None
                }
            })
            .collect()
    }
}

/// Time-ordered id with a random suffix for same-millisecond saves.
fn generate_preset_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("filter_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneldeck_durable_cache::{MemoryTier, StorageTier};
    use serde_json::json;

    fn set(value: Value) -> FilterSet {
        FilterSet::try_from(value).expect("object")
    }

    fn center() -> (Arc<DurableCache>, FilterCenter) {
        let cache = Arc::new(DurableCache::in_memory());
        let center = FilterCenter::open(cache.clone(), StorageKeys::default());
        (cache, center)
    }

    #[test]
    fn sequential_merges_accumulate_domains() {
        let (_, center) = center();
        center.merge_filters(&set(json!({"property": {"a": 1}})));
        let active = center.merge_filters(&set(json!({"geographic": {"b": 2}})));
        assert_eq!(
            Value::from(active),
            json!({"property": {"a": 1}, "geographic": {"b": 2}})
        );
    }

    #[test]
    fn apply_replaces_instead_of_merging() {
        let (_, center) = center();
        center.apply_filters(set(json!({"property": {"a": 1}})));
        let active = center.apply_filters(set(json!({"geographic": {"b": 2}})));
        assert_eq!(Value::from(active), json!({"geographic": {"b": 2}}));
    }

    #[test]
    fn clear_writes_an_explicit_empty_set() {
        let (cache, center) = center();
        center.apply_filters(set(json!({"property": {"a": 1}})));
        assert!(center.clear_filters().is_empty());

        let stored: Option<Value> = cache.load(&StorageKeys::default().active_filters());
        assert_eq!(stored, Some(json!({})));
    }

    #[test]
    fn clear_during_a_primary_outage_survives_reopen() {
        let primary = Arc::new(MemoryTier::new("local"));
        let cache = Arc::new(DurableCache::new(
            primary.clone(),
            Arc::new(MemoryTier::new("session")),
        ));
        let center = FilterCenter::open(cache.clone(), StorageKeys::default());
        center.apply_filters(set(json!({"property": {"a": 1}})));

        primary.fail_writes(true);
        center.clear_filters();
        primary.fail_writes(false);

        let reopened = FilterCenter::open(cache, StorageKeys::default());
        assert!(reopened.active_filters().is_empty());
    }

    #[test]
    fn state_is_restored_by_a_new_center() {
        let (cache, center) = center();
        center.merge_filters(&set(json!({"property": {"propertyType": "Land"}})));
        let preset = center
            .save_filter("Land only", set(json!({"property": {"propertyType": "Land"}})), None)
            .unwrap();

        let reopened = FilterCenter::open(cache, StorageKeys::default());
        assert_eq!(reopened.active_filters(), center.active_filters());
        assert_eq!(reopened.presets(), vec![preset]);
    }

    #[test]
    fn save_filter_creates_fresh_version_one_presets() {
        let (_, center) = center();
        let a = center.save_filter("A", FilterSet::new(), None).unwrap();
        let b = center
            .save_filter("B", FilterSet::new(), Some("second".into()))
            .unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("filter_"));
        assert_eq!(a.version, 1);
        assert_eq!(a.created_at, a.updated_at);
        assert_eq!(b.description.as_deref(), Some("second"));
        assert_eq!(center.presets().len(), 2);

        assert!(matches!(
            center.save_filter("   ", FilterSet::new(), None),
            Err(FilterError::InvalidPreset { .. })
        ));
        assert_eq!(center.presets().len(), 2);
    }

    #[test]
    fn delete_is_a_noop_for_unknown_ids() {
        let (_, center) = center();
        let preset = center.save_filter("A", FilterSet::new(), None).unwrap();
        assert!(!center.delete_filter("missing"));
        assert!(center.delete_filter(&preset.id));
        assert!(center.presets().is_empty());
    }

    #[test]
    fn load_filter_applies_valid_presets() {
        let (_, center) = center();
        center.apply_filters(set(json!({"stale": {"x": 1}})));
        let preset = center
            .save_filter("Homes", set(json!({"property": {"propertyType": "Residential"}})), None)
            .unwrap();

        let applied = center.load_filter(&preset.id).unwrap();
        assert_eq!(
            Value::from(applied),
            json!({"property": {"propertyType": "Residential"}})
        );
        assert_eq!(center.active_filters().len(), 1);
    }

    #[test]
    fn load_filter_refuses_missing_and_invalid_presets() {
        let primary = Arc::new(MemoryTier::new("local"));
        let cache = Arc::new(DurableCache::new(
            primary.clone(),
            Arc::new(MemoryTier::new("session")),
        ));
        let keys = StorageKeys::default();
        let damaged = json!({
            "version": 1,
            "updatedAt": 0,
            "data": [
                {"id": "broken", "name": "Broken", "filters": "oops"},
                {"id": "", "name": "No id", "filters": {}},
                42
            ]
        });
        primary
            .set_item(&keys.filter_presets(), &damaged.to_string())
            .unwrap();

        let center = FilterCenter::open(cache, keys);
        assert_eq!(center.presets().len(), 2);
        center.apply_filters(set(json!({"property": {"a": 1}})));
        let before = center.active_filters();

        assert_eq!(
            center.load_filter("missing"),
            Err(FilterError::NotFound("missing".into()))
        );
        assert!(matches!(
            center.load_filter("broken"),
            Err(FilterError::InvalidPreset { .. })
        ));
        assert!(center.load_filter("").is_err());
        assert_eq!(center.active_filters(), before);
    }

    #[test]
    fn update_filter_bumps_version_and_rejects_invalid_patches() {
        let (_, center) = center();
        let preset = center.save_filter("A", FilterSet::new(), None).unwrap();

        let updated = center
            .update_filter(
                &preset.id,
                FilterConfigPatch {
                    name: Some("Renamed".into()),
                    filters: Some(set(json!({"geographic": {"county": "Kent"}}))),
                    ..FilterConfigPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.created_at, preset.created_at);

        let rejected = center.update_filter(
            &preset.id,
            FilterConfigPatch {
                name: Some(String::new()),
                ..FilterConfigPatch::default()
            },
        );
        assert!(matches!(rejected, Err(FilterError::InvalidPreset { .. })));
        assert_eq!(center.preset(&preset.id).unwrap().name, "Renamed");

        assert_eq!(
            center.update_filter("ghost", FilterConfigPatch::default()),
            Err(FilterError::NotFound("ghost".into()))
        );
    }

    #[test]
    fn default_preset_is_exclusive_and_applicable() {
        let (_, center) = center();
        let a = center
            .save_filter("A", set(json!({"property": {"a": 1}})), None)
            .unwrap();
        let b = center
            .save_filter("B", set(json!({"property": {"b": 2}})), None)
            .unwrap();

        center.set_default_filter(&a.id).unwrap();
        center.set_default_filter(&b.id).unwrap();
        let defaults: Vec<_> = center
            .presets()
            .into_iter()
            .filter(|preset| preset.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, b.id);

        let applied = center.apply_default_filter().expect("default applied");
        assert_eq!(Value::from(applied), json!({"property": {"b": 2}}));
        assert!(center.set_default_filter("ghost").is_err());
    }

    #[test]
    fn watchers_see_every_commit() {
        let (_, center) = center();
        let mut rx = center.subscribe();
        center.merge_filters(&set(json!({"property": {"a": 1}})));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        center.clear_filters();
        assert!(rx.borrow_and_update().is_empty());
    }
}
