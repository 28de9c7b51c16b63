use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use paneldeck_core_types::DeckError;

/// Well-known event types. Any other string is accepted by the bus.
pub mod kinds {
    pub const FILTER: &str = "filter";
    pub const SELECTION: &str = "selection";
    pub const HIGHLIGHT: &str = "highlight";
    pub const PANEL: &str = "panel";
}

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Cross-panel broadcast message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    pub source: String,
}

impl PanelEvent {
    pub fn new(kind: impl Into<String>, payload: Value, source: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload,
            source: source.into(),
        }
    }

    pub fn is_from(&self, panel: &str) -> bool {
        self.source == panel
    }
}

pub type SubscriberResult = Result<(), DeckError>;

pub type Callback<E> = Arc<dyn Fn(&E) -> SubscriberResult + Send + Sync>;

pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    fn publish(&self, event: E) -> DispatchReport;
    fn subscribe(&self, callback: Callback<E>) -> Subscription;
}

/// Outcome of a single publish call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// Listeners in the snapshot that were unsubscribed before their turn.
    pub skipped: usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub errors: u64,
    pub panics: u64,
}

struct Listener<E> {
    id: u64,
    active: AtomicBool,
    callback: Callback<E>,
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

struct ListenerRegistry<E> {
    // Copy-on-write: publish clones the Arc and releases the lock before dispatch.
    listeners: Mutex<Arc<Vec<Arc<Listener<E>>>>>,
    next_id: AtomicU64,
}

impl<E> ListenerRegistry<E> {
    fn new() -> Self {
        Self {
            listeners: Mutex::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn add(&self, callback: Callback<E>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener {
            id,
            active: AtomicBool::new(true),
            callback,
        });
        let mut guard = self.listeners.lock();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
        id
    }

    fn snapshot(&self) -> Arc<Vec<Arc<Listener<E>>>> {
        Arc::clone(&self.listeners.lock())
    }

    fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<E: Send + Sync> Unsubscribe for ListenerRegistry<E> {
    fn remove(&self, id: u64) -> bool {
        let mut guard = self.listeners.lock();
        let Some(position) = guard.iter().position(|listener| listener.id == id) else {
            return false;
        };
        guard[position].active.store(false, Ordering::SeqCst);
        let next: Vec<_> = guard
            .iter()
            .filter(|listener| listener.id != id)
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }
}

/// Handle returned by `subscribe`. Dropping it unsubscribes the callback.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Unsubscribe>,
    detached: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes exactly this callback. Returns false if it was already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.detached = true;
        self.remove()
    }

    /// Keeps the callback registered for as long as the bus lives.
    pub fn detach(mut self) {
        self.detached = true;
    }

    fn remove(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.detached)
            .finish()
    }
}

#[derive(Default)]
struct BusCounters {
    published: AtomicU64,
    delivered: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
}

/// Synchronous fan-out bus. Each instance is independent.
pub struct InMemoryBus<E = PanelEvent>
where
    E: Event,
{
    registry: Arc<ListenerRegistry<E>>,
    counters: BusCounters,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a plain closure.
    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) -> SubscriberResult + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(callback))
    }

    /// Registers a closure that only sees events accepted by `predicate`.
    pub fn subscribe_filtered<P, F>(&self, predicate: P, callback: F) -> Subscription
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        F: Fn(&E) -> SubscriberResult + Send + Sync + 'static,
    {
        self.subscribe_fn(move |event| {
            if predicate(event) {
                callback(event)
            } else {
                Ok(())
            }
        })
    }

    /// Bridges the bus into an async consumer.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe_fn(move |event: &E| {
            tx.send(event.clone())
                .map_err(|_| DeckError::new("channel receiver dropped"))
        });
        (subscription, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            panics: self.counters.panics.load(Ordering::Relaxed),
        }
    }

    fn dispatch(&self, event: &E) -> DispatchReport {
        let snapshot = self.registry.snapshot();
        let mut report = DispatchReport::default();
        for listener in snapshot.iter() {
            if !listener.active.load(Ordering::SeqCst) {
                report.skipped += 1;
                continue;
            }
            let callback = Arc::clone(&listener.callback);
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(subscriber = listener.id, error = %err, "event subscriber failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    self.counters.panics.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        subscriber = listener.id,
                        panic = %panic_message(panic.as_ref()),
                        "event subscriber panicked"
                    );
                }
            }
        }
        self.counters
            .delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        report
    }
}

impl<E> Default for InMemoryBus<E>
where
    E: Event,
{
    fn default() -> Self {
        Self {
            registry: Arc::new(ListenerRegistry::new()),
            counters: BusCounters::default(),
        }
    }
}

impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    fn publish(&self, event: E) -> DispatchReport {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        let report = self.dispatch(&event);
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "event published"
        );
        report
    }

    fn subscribe(&self, callback: Callback<E>) -> Subscription {
        let id = self.registry.add(callback);
        let registry: Arc<dyn Unsubscribe> = self.registry.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
            detached: false,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
