//! SQLite storage backend for xmcl-edge.

use super::{LockToken, TranslationStore};
use crate::error::StorageError;
use async_trait::async_trait;
use edge_types::{CachedTranslation, ContentHash};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// SQLite-based translation cache and lock table.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("connections", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // Each connection to :memory: is its own database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS translations (
                hash TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                locale TEXT NOT NULL,
                text_kind TEXT NOT NULL,
                kind TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS translation_locks (
                hash TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                acquired_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        Ok(())
    }

    /// Shift every lock's acquisition time `secs` into the past.
    #[cfg(test)]
    pub(crate) async fn age_locks(&self, secs: i64) {
        sqlx::query("UPDATE translation_locks SET acquired_at = acquired_at - ?1")
            .bind(secs)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub(crate) fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl TranslationStore for SqliteStore {
    async fn get(&self, hash: &ContentHash) -> Result<Option<CachedTranslation>, StorageError> {
        let row = sqlx::query_as::<_, TranslationRow>(
            r#"
            SELECT hash, content, locale, text_kind, kind, created_at
            FROM translations
            WHERE hash = ?1
            "#,
        )
        .bind(hash.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(CachedTranslation::try_from).transpose()
    }

    async fn insert(&self, entry: &CachedTranslation) -> Result<bool, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO translations (hash, content, locale, text_kind, kind, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.hash.to_hex())
        .bind(&entry.content)
        .bind(&entry.locale)
        .bind(entry.text_kind.mime())
        .bind(entry.kind.as_str())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_lock(&self, hash: &ContentHash) -> Result<Option<LockToken>, StorageError> {
        let token = LockToken::generate();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO translation_locks (hash, token, acquired_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(hash.to_hex())
        .bind(token.as_str())
        .bind(Self::current_timestamp())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok((result.rows_affected() == 1).then_some(token))
    }

    async fn refresh_lock(
        &self,
        hash: &ContentHash,
        token: &LockToken,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE translation_locks SET acquired_at = ?1 WHERE hash = ?2 AND token = ?3",
        )
        .bind(Self::current_timestamp())
        .bind(hash.to_hex())
        .bind(token.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlock(&self, hash: &ContentHash, token: &LockToken) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM translation_locks WHERE hash = ?1 AND token = ?2")
            .bind(hash.to_hex())
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }

    async fn release_stale_locks(&self, cutoff: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM translation_locks WHERE acquired_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM translations")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count as u64)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct TranslationRow {
    hash: String,
    content: String,
    locale: String,
    text_kind: String,
    kind: String,
    created_at: i64,
}

impl TryFrom<TranslationRow> for CachedTranslation {
    type Error = StorageError;

    fn try_from(row: TranslationRow) -> Result<Self, Self::Error> {
        let corrupt = |e: edge_types::TypesError| StorageError::Corrupt(e.to_string());
        Ok(CachedTranslation {
            hash: ContentHash::from_hex(&row.hash).map_err(corrupt)?,
            content: row.content,
            locale: row.locale,
            text_kind: row.text_kind.parse().map_err(corrupt)?,
            kind: row.kind.parse().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}
