use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use paneldeck_core_types::{merged, shallow_merge, ContentType, JsonMap, PanelId, Position, Size};

use crate::errors::PanelStateError;
use crate::store::PanelStateStore;

/// Whether and how often a panel writes its state through the cache.
#[derive(Clone, Debug)]
pub struct PersistOption {
    pub enabled: bool,
    /// Minimum spacing between writes; skipped writes are flushed on dispose.
    pub debounce: Option<Duration>,
}

impl PersistOption {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            debounce: None,
        }
    }

    pub fn debounced(window: Duration) -> Self {
        Self {
            enabled: true,
            debounce: Some(window),
        }
    }
}

impl Default for PersistOption {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: None,
        }
    }
}

/// A state change: either a partial patch or a pure function of the old state.
pub enum StateUpdate {
    Patch(JsonMap),
    With(Box<dyn FnOnce(&JsonMap) -> JsonMap + Send>),
}

impl StateUpdate {
    pub fn with<F>(update: F) -> Self
    where
        F: FnOnce(&JsonMap) -> JsonMap + Send + 'static,
    {
        StateUpdate::With(Box::new(update))
    }

    fn apply(self, current: &JsonMap) -> JsonMap {
        match self {
            StateUpdate::Patch(patch) => merged(current, &patch),
            StateUpdate::With(update) => update(current),
        }
    }
}

impl From<JsonMap> for StateUpdate {
    fn from(value: JsonMap) -> Self {
        StateUpdate::Patch(value)
    }
}

pub type ChangeListener = Arc<dyn Fn(&JsonMap) + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

struct SyncState {
    state: JsonMap,
    version: u64,
    dirty: bool,
    last_persist: Option<Instant>,
    disposed: bool,
}

/// Local state of one panel, kept in step with its persisted record.
pub struct PanelStateSync {
    panel_id: PanelId,
    content_type: ContentType,
    initial_state: JsonMap,
    persist: PersistOption,
    store: PanelStateStore,
    inner: Mutex<SyncState>,
    listeners: Mutex<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
}

impl PanelStateSync {
    /// Restores persisted state when its content type matches; the loaded
    /// values win over `initial_state` and keys only present in the defaults
    /// are kept.
    pub fn open(
        panel_id: impl Into<PanelId>,
        initial_state: JsonMap,
        content_type: ContentType,
        persist: PersistOption,
        store: PanelStateStore,
    ) -> Result<Self, PanelStateError> {
        let panel_id = panel_id.into();
        if panel_id.as_str().is_empty() {
            return Err(PanelStateError::EmptyPanelId);
        }

        let mut state = initial_state.clone();
        let mut version = 0;
        if persist.enabled {
            match store.load_panel_state(panel_id.as_str()) {
                Some(record) if record.content_type == content_type => {
                    shallow_merge(&mut state, &record.state);
                    version = record.version;
                    info!(panel = %panel_id, version, "panel state restored");
                }
                Some(record) => {
                    debug!(
                        panel = %panel_id,
                        stored = %record.content_type,
                        expected = %content_type,
                        "stored panel state has another content type; ignored"
                    );
                }
                None => {}
            }
        }

        Ok(Self {
            panel_id,
            content_type,
            initial_state,
            persist,
            store,
            inner: Mutex::new(SyncState {
                state,
                version,
                dirty: false,
                last_persist: None,
                disposed: false,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        })
    }

    pub fn panel_id(&self) -> &PanelId {
        &self.panel_id
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn state(&self) -> JsonMap {
        self.inner.lock().state.clone()
    }

    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    pub fn is_maximized(&self) -> bool {
        is_maximized(&self.inner.lock().state)
    }

    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&JsonMap) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Applies `update`, bumps the version, persists and notifies listeners.
    pub fn update_state(&self, update: impl Into<StateUpdate>) -> JsonMap {
        let next = {
            let mut inner = self.inner.lock();
            inner.state = update.into().apply(&inner.state);
            inner.version += 1;
            inner.dirty = true;
            self.persist_locked(&mut inner, false);
            inner.state.clone()
        };
        self.notify(&next);
        next
    }

    pub fn update_position(&self, position: Position) -> JsonMap {
        self.update_state(patch("position", json!({"x": position.x, "y": position.y})))
    }

    pub fn update_size(&self, size: Size) -> JsonMap {
        self.update_state(patch(
            "size",
            json!({"width": size.width, "height": size.height}),
        ))
    }

    pub fn toggle_maximized(&self) -> JsonMap {
        self.update_state(StateUpdate::with(|current| {
            let mut next = current.clone();
            next.insert("isMaximized".into(), Value::Bool(!is_maximized(current)));
            next
        }))
    }

    /// Back to `initial_state` at version 0; the persisted record is removed.
    pub fn reset_state(&self) -> JsonMap {
        let next = {
            let mut inner = self.inner.lock();
            inner.state = self.initial_state.clone();
            inner.version = 0;
            inner.dirty = false;
            inner.last_persist = None;
            if self.persist.enabled {
                self.store.delete_panel_state(self.panel_id.as_str());
            }
            inner.state.clone()
        };
        info!(panel = %self.panel_id, "panel state reset");
        self.notify(&next);
        next
    }

    /// Flushes any write held back by the debounce window. Later calls and
    /// the eventual drop do nothing.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        self.persist_locked(&mut inner, true);
        debug!(panel = %self.panel_id, version = inner.version, "panel state disposed");
    }

    fn persist_locked(&self, inner: &mut SyncState, flush: bool) {
        if !self.persist.enabled || !inner.dirty {
            return;
        }
        if !flush {
            if let (Some(window), Some(last)) = (self.persist.debounce, inner.last_persist) {
                if last.elapsed() < window {
                    return;
                }
            }
        }
        match self.store.save_panel_state(
            self.panel_id.as_str(),
            &self.content_type,
            &inner.state,
            inner.version,
        ) {
            Ok(record) => {
                inner.version = record.version;
                inner.dirty = false;
                inner.last_persist = Some(Instant::now());
            }
            Err(err) => {
                warn!(panel = %self.panel_id, error = %err, "panel state not persisted");
            }
        }
    }

    fn notify(&self, state: &JsonMap) {
        let listeners: Vec<ChangeListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                warn!(panel = %self.panel_id, "panel state listener panicked");
            }
        }
    }
}

impl Drop for PanelStateSync {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn patch(key: &str, value: Value) -> StateUpdate {
    let mut map = JsonMap::new();
    map.insert(key.to_string(), value);
    StateUpdate::Patch(map)
}

fn is_maximized(state: &JsonMap) -> bool {
    state
        .get("isMaximized")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
