use crate::core::identity::CacheKey;
use crate::models::{CacheEntry, MatchResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Stored result for {key} is unreadable: {source}")]
    Corrupted {
        key: String,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(serde_json::Error),

    #[error("Refusing to cache an error result")]
    ErrorResult,
}

/// Persistent store of prior match results keyed by content identity
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up a stored result; `cached` is returned as stored
    async fn get(&self, key: &CacheKey) -> Result<Option<MatchResult>, CacheError>;

    /// Insert or fully replace the entry for `key`
    async fn put(
        &self,
        key: &CacheKey,
        cv_text: &str,
        job_text: &str,
        result: &MatchResult,
    ) -> Result<(), CacheError>;

    /// Delete entries created more than `ttl` ago, returning how many were removed
    async fn sweep(&self, ttl: Duration) -> Result<u64, CacheError>;

    /// Number of stored entries
    async fn len(&self) -> Result<u64, CacheError>;
}

/// L1 value; remembers when the row was written to L2
#[derive(Debug, Clone)]
struct L1Entry {
    result: MatchResult,
    created_at_ms: i64,
}

/// Expires L1 entries `ttl` after the row's `created_at`, not after they
/// were loaded into memory
struct CreatedAtExpiry {
    ttl: Duration,
}

impl CreatedAtExpiry {
    fn remaining(&self, created_at_ms: i64) -> Duration {
        remaining_ttl(self.ttl, created_at_ms, Utc::now().timestamp_millis())
    }
}

impl moka::Expiry<String, L1Entry> for CreatedAtExpiry {
    fn expire_after_create(&self, _key: &String, value: &L1Entry, _created_at: Instant) -> Option<Duration> {
        Some(self.remaining(value.created_at_ms))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &L1Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.remaining(value.created_at_ms))
    }
}

/// Time left before a row created at `created_at_ms` outlives `ttl`
fn remaining_ttl(ttl: Duration, created_at_ms: i64, now_ms: i64) -> Duration {
    let age_ms = u64::try_from(now_ms.saturating_sub(created_at_ms)).unwrap_or(0);
    ttl.saturating_sub(Duration::from_millis(age_ms))
}

/// Two-tier result cache
///
/// L1 is an in-process moka cache, L2 is a SQLite table that survives
/// restarts. Writes go through both tiers; reads fall back to L2 and
/// repopulate L1. L1 entries expire relative to the stored `created_at`,
/// so an old row reloaded from L2 does not get a fresh lease.
pub struct SqliteCache {
    pool: SqlitePool,
    l1_cache: Option<moka::future::Cache<String, L1Entry>>,
}

impl SqliteCache {
    /// Open (creating if needed) the cache database at `path`
    pub async fn open<P: AsRef<Path>>(
        path: P,
        l1_size: u64,
        ttl: Duration,
    ) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Self::with_pool(pool, l1_size, ttl).await
    }

    /// Private in-memory database, lost when the cache is dropped
    pub async fn in_memory(l1_size: u64, ttl: Duration) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every in-memory connection is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, l1_size, ttl).await
    }

    async fn with_pool(pool: SqlitePool, l1_size: u64, ttl: Duration) -> Result<Self, CacheError> {
        sqlx::migrate!("./migrations").run(&pool).await?;

        let l1_cache = (l1_size > 0).then(|| {
            moka::future::Cache::builder()
                .max_capacity(l1_size)
                .expire_after(CreatedAtExpiry { ttl })
                .build()
        });

        Ok(Self { pool, l1_cache })
    }

    /// Insert or replace an entry with an explicit creation time
    pub async fn put_at(
        &self,
        key: &CacheKey,
        cv_text: &str,
        job_text: &str,
        result: &MatchResult,
        created_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        if result.error {
            return Err(CacheError::ErrorResult);
        }

        let json = serde_json::to_string(result).map_err(CacheError::Serialization)?;
        let created_at_ms = created_at.timestamp_millis();

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO match_cache (hash, cv_content, job_content, result, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.as_str())
        .bind(cv_text)
        .bind(job_text)
        .bind(&json)
        .bind(created_at_ms)
        .execute(&self.pool)
        .await?;

        if let Some(l1) = &self.l1_cache {
            let entry = L1Entry {
                result: result.clone(),
                created_at_ms,
            };
            l1.insert(key.to_string(), entry).await;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Fetch the full stored row for a key
    pub async fn entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query(
            r#"
            SELECT hash, cv_content, job_content, result, created_at
            FROM match_cache
            WHERE hash = ?
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_ms: i64 = row.try_get("created_at")?;

        Ok(Some(CacheEntry {
            key: row.try_get("hash")?,
            raw_cv_text: row.try_get("cv_content")?,
            raw_job_text: row.try_get("job_content")?,
            serialized_result: row.try_get("result")?,
            created_at: Utc
                .timestamp_millis_opt(created_ms)
                .single()
                .unwrap_or_default(),
        }))
    }

    /// Close the underlying pool; further operations fail as unavailable
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ResultCache for SqliteCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<MatchResult>, CacheError> {
        if let Some(l1) = &self.l1_cache {
            if let Some(entry) = l1.get(key.as_str()).await {
                tracing::trace!("L1 cache hit: {}", key);
                return Ok(Some(entry.result));
            }
        }

        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT result, created_at FROM match_cache WHERE hash = ?")
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        let Some((json, created_at_ms)) = row else {
            tracing::trace!("Cache miss: {}", key);
            return Ok(None);
        };

        let result: MatchResult = serde_json::from_str(&json).map_err(|source| CacheError::Corrupted {
            key: key.to_string(),
            source,
        })?;

        tracing::trace!("L2 cache hit: {}", key);
        if let Some(l1) = &self.l1_cache {
            let entry = L1Entry {
                result: result.clone(),
                created_at_ms,
            };
            l1.insert(key.to_string(), entry).await;
        }

        Ok(Some(result))
    }

    async fn put(
        &self,
        key: &CacheKey,
        cv_text: &str,
        job_text: &str,
        result: &MatchResult,
    ) -> Result<(), CacheError> {
        self.put_at(key, cv_text, job_text, result, Utc::now()).await
    }

    async fn sweep(&self, ttl: Duration) -> Result<u64, CacheError> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(ttl_ms);

        let removed = sqlx::query("DELETE FROM match_cache WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        // L1 may hold rows that were just deleted
        if let Some(l1) = &self.l1_cache {
            l1.invalidate_all();
        }

        tracing::debug!("Swept {} expired cache entries", removed);
        Ok(removed)
    }

    async fn len(&self) -> Result<u64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM match_cache")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}
