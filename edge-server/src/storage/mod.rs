//! Storage layer for xmcl-edge.
//!
//! Holds the translation cache and the single-flight locks. Both are keyed by
//! [`ContentHash`]; cache entries are immutable once written, and a lock row
//! only exists while a translation job for that hash is in flight.
//!
//! Each lock carries a [`LockToken`] naming its owner. Refreshing and
//! releasing a lock only succeed for the owner, so a job whose lock was swept
//! as stale can never release the lock of the job that replaced it.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StorageError;
use async_trait::async_trait;
use edge_types::{CachedTranslation, ContentHash};
use std::fmt;

/// Owner of one acquisition of a translation lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// A fresh, unique token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The token as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for translation cache and lock backends.
///
/// Implementations must make [`try_lock`](Self::try_lock) an atomic
/// create-if-absent, so that concurrent callers (including other processes
/// sharing the store) see exactly one winner.
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Look up a cached translation.
    async fn get(&self, hash: &ContentHash) -> Result<Option<CachedTranslation>, StorageError>;

    /// Store a translation unless one already exists for the hash.
    ///
    /// Returns `true` if the entry was written.
    async fn insert(&self, entry: &CachedTranslation) -> Result<bool, StorageError>;

    /// Try to take the translation lock for a hash.
    ///
    /// Returns the owner token, or `None` if the lock is already held.
    async fn try_lock(&self, hash: &ContentHash) -> Result<Option<LockToken>, StorageError>;

    /// Restamp the lock's acquisition time if `token` still owns it.
    ///
    /// Returns `false` if the lock was released or taken by someone else.
    async fn refresh_lock(
        &self,
        hash: &ContentHash,
        token: &LockToken,
    ) -> Result<bool, StorageError>;

    /// Release the lock if `token` still owns it. Otherwise a no-op.
    async fn unlock(&self, hash: &ContentHash, token: &LockToken) -> Result<(), StorageError>;

    /// Release every lock acquired before `cutoff` (Unix seconds).
    ///
    /// Returns the number of locks released.
    async fn release_stale_locks(&self, cutoff: i64) -> Result<u64, StorageError>;

    /// Number of cached translations.
    async fn count(&self) -> Result<u64, StorageError>;
}
