use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use paneldeck_core_types::JsonMap;
use paneldeck_durable_cache::{DurableCache, FileTier, StorageKeys};
use paneldeck_event_bus::{kinds, DispatchReport, EventBus, InMemoryBus, PanelEvent};
use paneldeck_filter_center::{FilterCenter, FilterSet};
use paneldeck_panel_state::{PanelStateError, PanelStateStore, PanelStateSync, PersistOption};
use paneldeck_state_center::{KeyedStore, PanelDescriptor};

use crate::config::DeckConfig;

/// One layout's worth of coordination: bus, panel registry, filters and
/// per-panel persisted state, all sharing a single durable cache.
pub struct PanelDeck {
    bus: Arc<InMemoryBus>,
    panels: KeyedStore<PanelDescriptor>,
    cache: Arc<DurableCache>,
    keys: StorageKeys,
    filters: Arc<FilterCenter>,
    panel_store: PanelStateStore,
    persist: PersistOption,
}

impl PanelDeck {
    /// File-backed tiers at the configured directories.
    pub fn from_config(config: &DeckConfig) -> Self {
        let storage = &config.storage;
        let cache = DurableCache::new(
            Arc::new(FileTier::new("primary", storage.primary_dir.clone())),
            Arc::new(FileTier::new("fallback", storage.fallback_dir.clone())),
        )
        .with_schema_version(storage.schema_version);
        info!(
            primary = %storage.primary_dir.display(),
            fallback = %storage.fallback_dir.display(),
            prefix = %storage.key_prefix,
            "panel deck opened"
        );
        Self::with_cache(
            Arc::new(cache),
            storage.keys(),
            config.panels.persist_option(),
        )
    }

    /// Ephemeral deck over two in-memory tiers.
    pub fn in_memory() -> Self {
        Self::with_cache(
            Arc::new(DurableCache::in_memory()),
            StorageKeys::default(),
            PersistOption::default(),
        )
    }

    pub fn with_cache(cache: Arc<DurableCache>, keys: StorageKeys, persist: PersistOption) -> Self {
        let filters = Arc::new(FilterCenter::open(cache.clone(), keys.clone()));
        let panel_store = PanelStateStore::new(cache.clone(), keys.clone());
        Self {
            bus: InMemoryBus::new(),
            panels: KeyedStore::new(),
            cache,
            keys,
            filters,
            panel_store,
            persist,
        }
    }

    pub fn bus(&self) -> &Arc<InMemoryBus> {
        &self.bus
    }

    pub fn panels(&self) -> &KeyedStore<PanelDescriptor> {
        &self.panels
    }

    /// Shared so bus subscribers can read the active filters.
    pub fn filters(&self) -> &Arc<FilterCenter> {
        &self.filters
    }

    pub fn cache(&self) -> &Arc<DurableCache> {
        &self.cache
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn panel_store(&self) -> &PanelStateStore {
        &self.panel_store
    }

    /// Registers `descriptor` and returns its state synchronizer.
    pub fn open_panel(
        &self,
        descriptor: PanelDescriptor,
        initial_state: JsonMap,
    ) -> Result<PanelStateSync, PanelStateError> {
        let sync = PanelStateSync::open(
            descriptor.id.clone(),
            initial_state,
            descriptor.content_type.clone(),
            self.persist.clone(),
            self.panel_store.clone(),
        )?;
        let id = descriptor.id.to_string();
        self.panels.register(id.clone(), descriptor);
        self.bus.publish(PanelEvent::new(
            kinds::PANEL,
            json!({"action": "opened", "id": id}),
            id.as_str(),
        ));
        debug!(panel = %id, "panel opened");
        Ok(sync)
    }

    /// Unregisters the panel; its persisted state is left in place.
    pub fn close_panel(&self, id: &str) -> bool {
        if !self.panels.contains(id) {
            return false;
        }
        self.panels.unregister(id);
        self.bus.publish(PanelEvent::new(
            kinds::PANEL,
            json!({"action": "closed", "id": id}),
            id,
        ));
        debug!(panel = id, "panel closed");
        true
    }

    /// Merges `filters` into the active set, then broadcasts
    /// `{filters: <incoming>}` as a `filter` event from `source`.
    pub fn publish_filters(&self, source: &str, filters: &FilterSet) -> DispatchReport {
        self.filters.merge_filters(filters);
        self.bus.publish(PanelEvent::new(
            kinds::FILTER,
            json!({ "filters": filters }),
            source,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use paneldeck_core_types::ContentType;

    #[test]
    fn open_and_close_broadcast_panel_events() {
        let deck = PanelDeck::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = deck.bus().subscribe_fn(move |event: &PanelEvent| {
            sink.lock().push(event.payload["action"].clone());
            Ok(())
        });

        let descriptor = PanelDescriptor::new("mapPanel", ContentType::Map, "Map");
        let panel = deck.open_panel(descriptor, JsonMap::new()).unwrap();
        assert_eq!(panel.content_type(), &ContentType::Map);
        assert!(deck.panels().contains("mapPanel"));

        assert!(deck.close_panel("mapPanel"));
        assert!(!deck.close_panel("mapPanel"));
        assert!(deck.panels().is_empty());
        assert_eq!(*seen.lock(), vec![json!("opened"), json!("closed")]);
    }

    #[test]
    fn panels_reopen_with_their_persisted_state() {
        let deck = PanelDeck::in_memory();
        let descriptor = PanelDescriptor::new("dataPanel", ContentType::Data, "Data");
        {
            let panel = deck.open_panel(descriptor.clone(), JsonMap::new()).unwrap();
            panel.toggle_maximized();
        }
        deck.close_panel("dataPanel");

        let reopened = deck.open_panel(descriptor, JsonMap::new()).unwrap();
        assert!(reopened.is_maximized());
        assert_eq!(reopened.version(), 1);
    }
}
