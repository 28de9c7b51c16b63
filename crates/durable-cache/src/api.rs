use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{decode, Decoded, Envelope};
use crate::tier::{MemoryTier, StorageTier};

pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TierKind {
    Primary,
    Fallback,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Primary => "primary",
            TierKind::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    /// Entries older than this are treated as absent on load.
    pub ttl: Option<Duration>,
}

impl SaveOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Where a save landed. `Failed` is informational; save never errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SaveOutcome {
    Primary,
    Fallback,
    Failed,
}

impl SaveOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, SaveOutcome::Failed)
    }
}

/// A value read back from a tier together with its envelope metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedEntry<T = Value> {
    pub data: T,
    /// `None` for values written in the legacy bare format.
    pub schema_version: Option<u32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tier: TierKind,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub primary_writes: u64,
    pub fallback_writes: u64,
    pub failed_writes: u64,
    pub primary_hits: u64,
    pub fallback_hits: u64,
    pub misses: u64,
    pub corrupt_reads: u64,
    pub tier_errors: u64,
}

#[derive(Default)]
struct CacheCounters {
    primary_writes: AtomicU64,
    fallback_writes: AtomicU64,
    failed_writes: AtomicU64,
    primary_hits: AtomicU64,
    fallback_hits: AtomicU64,
    misses: AtomicU64,
    corrupt_reads: AtomicU64,
    tier_errors: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Versioned, two-tier, best-effort persistence.
///
/// Storage is unreliable I/O: every failure is logged and degrades to
/// "nothing was stored" instead of reaching the caller.
pub struct DurableCache {
    primary: Arc<dyn StorageTier>,
    fallback: Arc<dyn StorageTier>,
    schema_version: u32,
    counters: CacheCounters,
}

impl DurableCache {
    pub fn new(primary: Arc<dyn StorageTier>, fallback: Arc<dyn StorageTier>) -> Self {
        Self {
            primary,
            fallback,
            schema_version: DEFAULT_SCHEMA_VERSION,
            counters: CacheCounters::default(),
        }
    }

    /// Two fresh in-memory tiers; handy for tests and ephemeral sessions.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTier::new("memory-primary")),
            Arc::new(MemoryTier::new("memory-fallback")),
        )
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn save<T>(&self, key: &str, value: &T, options: SaveOptions) -> SaveOutcome
    where
        T: Serialize + ?Sized,
    {
        let now = Utc::now();
        let expires_at = options
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl);
        let envelope = Envelope {
            version: self.schema_version,
            updated_at: now,
            data: value,
            expires_at,
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                // The fallback would reject the same payload, so stop here.
                bump(&self.counters.failed_writes);
                warn!(key, error = %err, "durable cache serialization failed");
                return SaveOutcome::Failed;
            }
        };

        match self.primary.set_item(key, &text) {
            Ok(()) => {
                bump(&self.counters.primary_writes);
                self.evict_stale(TierKind::Fallback, key);
                return SaveOutcome::Primary;
            }
            Err(err) => {
                bump(&self.counters.tier_errors);
                warn!(
                    key,
                    tier = self.primary.name(),
                    error = %err,
                    "primary tier write failed; retrying on fallback"
                );
            }
        }

        match self.fallback.set_item(key, &text) {
            Ok(()) => {
                bump(&self.counters.fallback_writes);
                self.evict_stale(TierKind::Primary, key);
                SaveOutcome::Fallback
            }
            Err(err) => {
                bump(&self.counters.tier_errors);
                bump(&self.counters.failed_writes);
                warn!(
                    key,
                    tier = self.fallback.name(),
                    error = %err,
                    "fallback tier write failed; value not persisted"
                );
                SaveOutcome::Failed
            }
        }
    }

    /// Typed load. `None` means not found in either tier.
    pub fn load<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.load_entry(key).map(|entry| entry.data)
    }

    pub fn load_entry<T>(&self, key: &str) -> Option<CachedEntry<T>>
    where
        T: DeserializeOwned,
    {
        let primary = self.read_tier::<T>(TierKind::Primary, key);
        let fallback = self.read_tier::<T>(TierKind::Fallback, key);
        let entry = match (primary, fallback) {
            (Some(primary), Some(fallback)) if is_newer(&fallback, &primary) => Some(fallback),
            (Some(primary), _) => Some(primary),
            (None, fallback) => fallback,
        };
        match &entry {
            Some(found) => match found.tier {
                TierKind::Primary => bump(&self.counters.primary_hits),
                TierKind::Fallback => bump(&self.counters.fallback_hits),
            },
            None => {
                bump(&self.counters.misses);
                debug!(key, "durable cache miss");
            }
        }
        entry
    }

    /// Deletes `key` from both tiers; a failure on one never blocks the other.
    pub fn remove(&self, key: &str) {
        for kind in [TierKind::Primary, TierKind::Fallback] {
            let tier = self.tier(kind);
            if let Err(err) = tier.remove_item(key) {
                bump(&self.counters.tier_errors);
                warn!(key, tier = tier.name(), error = %err, "durable cache remove failed");
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            primary_writes: c.primary_writes.load(Ordering::Relaxed),
            fallback_writes: c.fallback_writes.load(Ordering::Relaxed),
            failed_writes: c.failed_writes.load(Ordering::Relaxed),
            primary_hits: c.primary_hits.load(Ordering::Relaxed),
            fallback_hits: c.fallback_hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            corrupt_reads: c.corrupt_reads.load(Ordering::Relaxed),
            tier_errors: c.tier_errors.load(Ordering::Relaxed),
        }
    }

    fn tier(&self, kind: TierKind) -> &Arc<dyn StorageTier> {
        match kind {
            TierKind::Primary => &self.primary,
            TierKind::Fallback => &self.fallback,
        }
    }

    /// Drops the copy a write did not reach, so it cannot outlive the new value.
    fn evict_stale(&self, kind: TierKind, key: &str) {
        let tier = self.tier(kind);
        if let Err(err) = tier.remove_item(key) {
            bump(&self.counters.tier_errors);
            warn!(key, tier = tier.name(), error = %err, "stale cache copy could not be removed");
        }
    }

    fn read_tier<T>(&self, kind: TierKind, key: &str) -> Option<CachedEntry<T>>
    where
        T: DeserializeOwned,
    {
        let tier = self.tier(kind);
        let raw = match tier.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                bump(&self.counters.tier_errors);
                warn!(key, tier = tier.name(), error = %err, "durable cache read failed");
                return None;
            }
        };

        let decoded: Decoded = match decode(&raw) {
            Ok(decoded) => decoded,
            Err(err) => {
                bump(&self.counters.corrupt_reads);
                warn!(key, tier = tier.name(), error = %err, "corrupt cache entry ignored");
                return None;
            }
        };

        if decoded.is_expired(Utc::now()) {
            debug!(key, tier = tier.name(), "expired cache entry dropped");
            if let Err(err) = tier.remove_item(key) {
                bump(&self.counters.tier_errors);
                warn!(key, tier = tier.name(), error = %err, "expired entry removal failed");
            }
            return None;
        }

        match serde_json::from_value::<T>(decoded.data) {
            Ok(data) => Some(CachedEntry {
                data,
                schema_version: decoded.schema_version,
                updated_at: decoded.updated_at,
                tier: kind,
            }),
            Err(err) => {
                bump(&self.counters.corrupt_reads);
                warn!(
                    key,
                    tier = tier.name(),
                    error = %err,
                    "cache entry has unexpected shape; ignored"
                );
                None
            }
        }
    }
}

/// Whether `candidate` was written after `current`. Legacy bare values carry
/// no timestamp and lose to any enveloped copy.
fn is_newer<T>(candidate: &CachedEntry<T>, current: &CachedEntry<T>) -> bool {
    match (candidate.updated_at, current.updated_at) {
        (Some(candidate), Some(current)) => candidate > current,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
