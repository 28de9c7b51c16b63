use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use paneldeck_core_types::{ContentType, JsonMap};
use paneldeck_durable_cache::{DurableCache, SaveOptions, StorageKeys};

use crate::errors::PanelStateError;
use crate::record::PanelStateRecord;

/// Save/load/delete of panel state records over the durable cache.
#[derive(Clone)]
pub struct PanelStateStore {
    cache: Arc<DurableCache>,
    keys: StorageKeys,
}

impl PanelStateStore {
    pub fn new(cache: Arc<DurableCache>, keys: StorageKeys) -> Self {
        Self { cache, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Writes `state` at `intended_version`.
    ///
    /// The stored record is read first. If it already holds a version at or
    /// above the intended one, the write goes out as `stored + 1` so versions
    /// stay monotonic across writers. The returned record carries the version
    /// actually written.
    pub fn save_panel_state(
        &self,
        panel_id: &str,
        content_type: &ContentType,
        state: &JsonMap,
        intended_version: u64,
    ) -> Result<PanelStateRecord, PanelStateError> {
        if panel_id.is_empty() {
            return Err(PanelStateError::EmptyPanelId);
        }
        let intended = intended_version.max(1);
        let version = match self.load_panel_state(panel_id) {
            Some(stored) if stored.version >= intended => {
                let resolved = stored.version.max(intended) + 1;
                warn!(
                    panel = panel_id,
                    stored = stored.version,
                    intended,
                    resolved,
                    "panel state version conflict"
                );
                resolved
            }
            _ => intended,
        };

        let record = PanelStateRecord {
            id: panel_id.to_string(),
            content_type: content_type.clone(),
            state: state.clone(),
            last_updated: Utc::now(),
            version,
        };
        let key = self.keys.panel_state(panel_id);
        if !self.cache.save(&key, &record, SaveOptions::default()).is_stored() {
            return Err(PanelStateError::NotPersisted { key });
        }
        debug!(panel = panel_id, version, "panel state persisted");
        Ok(record)
    }

    /// Stored record, or `None` when absent or unreadable.
    pub fn load_panel_state(&self, panel_id: &str) -> Option<PanelStateRecord> {
        let value = self.cache.load::<Value>(&self.keys.panel_state(panel_id))?;
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(panel = panel_id, error = %err, "stored panel state ignored");
                None
            }
        }
    }

    pub fn delete_panel_state(&self, panel_id: &str) {
        self.cache.remove(&self.keys.panel_state(panel_id));
    }
}
