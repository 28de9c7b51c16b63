pub mod api;
pub mod envelope;
pub mod errors;
pub mod keys;
pub mod tier;

pub use api::{
    CacheStats, CachedEntry, DurableCache, SaveOptions, SaveOutcome, TierKind,
    DEFAULT_SCHEMA_VERSION,
};
pub use envelope::Envelope;
pub use errors::TierError;
pub use keys::StorageKeys;
pub use tier::{FileTier, MemoryTier, StorageTier};
