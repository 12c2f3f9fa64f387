//! store.rs: persistent set of delivered-article fingerprints.
//!
//! The store is the single source of truth for "already delivered". Each
//! operation acquires a pooled connection and releases it on return; a
//! successful `record` is durable once it returns.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::fingerprint::Fingerprint;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("fingerprint {0} already recorded")]
    DuplicateKey(Fingerprint),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record {fingerprint}: {reason}")]
    Corrupt { fingerprint: String, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One delivered article. Inserted once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredRecord {
    pub fingerprint: Fingerprint,
    pub original_title: String,
    pub translated_title: String,
    pub url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
}

#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Read-only membership check.
    async fn exists(&self, fp: &Fingerprint) -> StoreResult<bool>;

    /// Insert a record. Fails with `StoreError::DuplicateKey` if the fingerprint is present.
    async fn record(&self, rec: &DeliveredRecord) -> StoreResult<()>;

    async fn get(&self, fp: &Fingerprint) -> StoreResult<Option<DeliveredRecord>>;

    async fn count(&self) -> StoreResult<u64>;
}

pub struct SqliteDedupStore {
    pool: SqlitePool,
}

impl SqliteDedupStore {
    /// Open (or create) the database at `database_url` and ensure the schema exists.
    /// Existing records are kept.
    pub async fn open(database_url: &str) -> StoreResult<Self> {
        let file = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if let Some(parent) = Path::new(file).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    tracing::warn!(error = %e, dir = %parent.display(), "could not create store directory");
                }
            }
        }

        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        tracing::info!(url = database_url, "dedup store ready");
        Ok(store)
    }

    /// Private in-memory database. A single long-lived connection keeps the data alive.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                title_translated TEXT NOT NULL,
                url TEXT NOT NULL,
                source TEXT NOT NULL,
                published_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_duplicate(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn exists(&self, fp: &Fingerprint) -> StoreResult<bool> {
        let row = sqlx::query("SELECT id FROM news WHERE id = ?")
            .bind(fp.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn record(&self, rec: &DeliveredRecord) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            INSERT INTO news (id, title, title_translated, url, source, published_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rec.fingerprint.as_str())
        .bind(&rec.original_title)
        .bind(&rec.translated_title)
        .bind(&rec.url)
        .bind(&rec.source_name)
        .bind(rec.published_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate(&e) => Err(StoreError::DuplicateKey(rec.fingerprint.clone())),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn get(&self, fp: &Fingerprint) -> StoreResult<Option<DeliveredRecord>> {
        let row = sqlx::query(
            "SELECT id, title, title_translated, url, source, published_at FROM news WHERE id = ?",
        )
        .bind(fp.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        let ts: String = row.try_get("published_at")?;
        let published_at = DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| StoreError::Corrupt {
                fingerprint: id.clone(),
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);

        Ok(Some(DeliveredRecord {
            fingerprint: Fingerprint::from_hex(id),
            original_title: row.try_get("title")?,
            translated_title: row.try_get("title_translated")?,
            url: row.try_get("url")?,
            source_name: row.try_get("source")?,
            published_at,
        }))
    }

    async fn count(&self) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use chrono::TimeZone;

    fn rec(title: &str, url: &str) -> DeliveredRecord {
        DeliveredRecord {
            fingerprint: fingerprint(title, url),
            original_title: title.to_string(),
            translated_title: format!("[ru] {title}"),
            url: url.to_string(),
            source_name: "CoinDesk".to_string(),
            published_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[tokio::test]
    async fn record_then_exists_and_get() {
        let store = SqliteDedupStore::open_in_memory().await.unwrap();
        let r = rec("BTC rallies", "https://example.test/1");
        assert!(!store.exists(&r.fingerprint).await.unwrap());

        store.record(&r).await.unwrap();
        assert!(store.exists(&r.fingerprint).await.unwrap());
        assert_eq!(store.get(&r.fingerprint).await.unwrap(), Some(r));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_insert_is_duplicate_key() {
        let store = SqliteDedupStore::open_in_memory().await.unwrap();
        let r = rec("BTC rallies", "https://example.test/1");
        store.record(&r).await.unwrap();

        let err = store.record(&r).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(fp) if fp == r.fingerprint));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("data/news.db").display());

        let r = rec("ETF inflows", "https://example.test/etf");
        {
            let store = SqliteDedupStore::open(&url).await.unwrap();
            store.record(&r).await.unwrap();
            store.close().await;
        }

        let store = SqliteDedupStore::open(&url).await.unwrap();
        assert!(store.exists(&r.fingerprint).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
        store.close().await;
    }
}
