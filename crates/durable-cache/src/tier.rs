use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use url::form_urlencoded;

use crate::errors::TierError;

/// One independently addressable key-value medium. Every call may fail.
pub trait StorageTier: Send + Sync {
    fn name(&self) -> &str;
    fn get_item(&self, key: &str) -> Result<Option<String>, TierError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), TierError>;
    fn remove_item(&self, key: &str) -> Result<(), TierError>;
}

/// Process-local tier, with switches to simulate an unreliable medium.
pub struct MemoryTier {
    name: String,
    items: DashMap<String, String>,
    quota_bytes: Option<usize>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
}

impl MemoryTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: DashMap::new(),
            quota_bytes: None,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
        }
    }

    /// Rejects writes that would push the total stored bytes past `bytes`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.items
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

impl StorageTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, TierError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TierError::Unavailable(format!("{} reads disabled", self.name)));
        }
        Ok(self.items.get(key).map(|entry| entry.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), TierError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TierError::Unavailable(format!("{} writes disabled", self.name)));
        }
        if let Some(quota) = self.quota_bytes {
            let bytes = key.len() + value.len();
            if self.used_bytes_excluding(key) + bytes > quota {
                return Err(TierError::QuotaExceeded {
                    key: key.to_string(),
                    bytes,
                });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), TierError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(TierError::Unavailable(format!("{} removes disabled", self.name)));
        }
        self.items.remove(key);
        Ok(())
    }
}

/// Directory-backed tier: one file per key, written atomically.
pub struct FileTier {
    name: String,
    root: PathBuf,
}

impl FileTier {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

impl StorageTier for FileTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_item(&self, key: &str) -> Result<Option<String>, TierError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), TierError> {
        write_atomic(&self.path_for(key), value.as_bytes())?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), TierError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Longest encoded key kept verbatim; leaves room for the `.json` suffix
/// well under the usual 255-byte filename limit.
const MAX_FILE_STEM: usize = 200;
const READABLE_PREFIX: usize = 64;

/// Maps a key to a filename; distinct keys always yield distinct names.
///
/// Keys are form-urlencoded. Oversized encodings keep a readable prefix and
/// append `~` plus the SHA-256 of the raw key. `~` never survives encoding,
/// so hashed names cannot clash with verbatim ones.
fn encode_key(key: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
    if encoded.len() <= MAX_FILE_STEM {
        return encoded;
    }
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!(
        "{}~{}",
        &encoded[..READABLE_PREFIX],
        hex::encode(hasher.finalize())
    )
}
