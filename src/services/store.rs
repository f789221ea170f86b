// src/services/store.rs
use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{AnalysisSnapshot, CacheRecord, SubscriptionTier};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cache record not found for channel '{0}'")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Persistence seam for per-channel cache metadata. The relational store
/// provides per-row atomic upserts; concurrent writers for the same channel
/// are last-writer-wins by contract.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, channel_id: &str) -> Result<Option<CacheRecord>, StorageError>;
    async fn upsert(&self, record: &CacheRecord) -> Result<(), StorageError>;
    /// Delete every record whose expiry is before `cutoff`; returns how many
    /// records were removed. Snapshots of removed channels go with them.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
    /// Last computed analysis for a channel, if one has been stored.
    async fn get_snapshot(&self, channel_id: &str) -> Result<Option<AnalysisSnapshot>, StorageError>;
    async fn put_snapshot(&self, snapshot: &AnalysisSnapshot) -> Result<(), StorageError>;
}

/// In-memory store, used in tests and when no `DATABASE_URL` is configured.
#[derive(Default)]
pub struct MemoryCacheStore {
    records: RwLock<HashMap<String, CacheRecord>>,
    snapshots: RwLock<HashMap<String, AnalysisSnapshot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, channel_id: &str) -> Result<Option<CacheRecord>, StorageError> {
        Ok(self.records.read().await.get(channel_id).cloned())
    }

    async fn upsert(&self, record: &CacheRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert(record.channel_id.clone(), record.clone());
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.cache_expires_at >= cutoff);

        let mut snapshots = self.snapshots.write().await;
        snapshots.retain(|channel_id, _| records.contains_key(channel_id));

        Ok((before - records.len()) as u64)
    }

    async fn get_snapshot(&self, channel_id: &str) -> Result<Option<AnalysisSnapshot>, StorageError> {
        Ok(self.snapshots.read().await.get(channel_id).cloned())
    }

    async fn put_snapshot(&self, snapshot: &AnalysisSnapshot) -> Result<(), StorageError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.channel_id.clone(), snapshot.clone());
        Ok(())
    }
}

/// Postgres-backed store.
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_cache (
                channel_id              TEXT PRIMARY KEY,
                tier                    TEXT NOT NULL,
                videos_analyzed         BIGINT NOT NULL,
                total_video_count       BIGINT NOT NULL,
                last_full_fetch         TIMESTAMPTZ NOT NULL,
                last_incremental_update TIMESTAMPTZ,
                cache_expires_at        TIMESTAMPTZ NOT NULL,
                upload_frequency        DOUBLE PRECISION,
                cache_duration_hours    BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Bucket and projection payloads are stored as JSON text.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_analysis (
                channel_id       TEXT PRIMARY KEY,
                niche            TEXT NOT NULL,
                monthly          TEXT NOT NULL,
                projection       TEXT NOT NULL,
                upload_frequency DOUBLE PRECISION NOT NULL,
                computed_at      TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<CacheRecord, StorageError> {
        let tier_str: String = row.try_get("tier")?;
        let tier = SubscriptionTier::from_str(&tier_str).map_err(StorageError::Backend)?;
        Ok(CacheRecord {
            channel_id: row.try_get("channel_id")?,
            tier,
            videos_analyzed: row.try_get("videos_analyzed")?,
            total_video_count: row.try_get("total_video_count")?,
            last_full_fetch: row.try_get("last_full_fetch")?,
            last_incremental_update: row.try_get("last_incremental_update")?,
            cache_expires_at: row.try_get("cache_expires_at")?,
            upload_frequency: row.try_get("upload_frequency")?,
            cache_duration_hours: row.try_get("cache_duration_hours")?,
        })
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, channel_id: &str) -> Result<Option<CacheRecord>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT channel_id, tier, videos_analyzed, total_video_count,
                   last_full_fetch, last_incremental_update, cache_expires_at,
                   upload_frequency, cache_duration_hours
            FROM channel_cache
            WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn upsert(&self, record: &CacheRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO channel_cache (
                channel_id, tier, videos_analyzed, total_video_count,
                last_full_fetch, last_incremental_update, cache_expires_at,
                upload_frequency, cache_duration_hours
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (channel_id) DO UPDATE SET
                tier = EXCLUDED.tier,
                videos_analyzed = EXCLUDED.videos_analyzed,
                total_video_count = EXCLUDED.total_video_count,
                last_full_fetch = EXCLUDED.last_full_fetch,
                last_incremental_update = EXCLUDED.last_incremental_update,
                cache_expires_at = EXCLUDED.cache_expires_at,
                upload_frequency = EXCLUDED.upload_frequency,
                cache_duration_hours = EXCLUDED.cache_duration_hours
            "#,
        )
        .bind(&record.channel_id)
        .bind(record.tier.as_str())
        .bind(record.videos_analyzed)
        .bind(record.total_video_count)
        .bind(record.last_full_fetch)
        .bind(record.last_incremental_update)
        .bind(record.cache_expires_at)
        .bind(record.upload_frequency)
        .bind(record.cache_duration_hours)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM channel_cache WHERE cache_expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM channel_analysis a
            WHERE NOT EXISTS (
                SELECT 1 FROM channel_cache c WHERE c.channel_id = a.channel_id
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_snapshot(&self, channel_id: &str) -> Result<Option<AnalysisSnapshot>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT channel_id, niche, monthly, projection, upload_frequency, computed_at
            FROM channel_analysis
            WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let monthly_json: String = row.try_get("monthly")?;
        let projection_json: String = row.try_get("projection")?;
        Ok(Some(AnalysisSnapshot {
            channel_id: row.try_get("channel_id")?,
            niche: row.try_get("niche")?,
            monthly: serde_json::from_str(&monthly_json)
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            projection: serde_json::from_str(&projection_json)
                .map_err(|e| StorageError::Backend(e.to_string()))?,
            upload_frequency: row.try_get("upload_frequency")?,
            computed_at: row.try_get("computed_at")?,
        }))
    }

    async fn put_snapshot(&self, snapshot: &AnalysisSnapshot) -> Result<(), StorageError> {
        let monthly = serde_json::to_string(&snapshot.monthly)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let projection = serde_json::to_string(&snapshot.projection)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO channel_analysis (
                channel_id, niche, monthly, projection, upload_frequency, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (channel_id) DO UPDATE SET
                niche = EXCLUDED.niche,
                monthly = EXCLUDED.monthly,
                projection = EXCLUDED.projection,
                upload_frequency = EXCLUDED.upload_frequency,
                computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(&snapshot.channel_id)
        .bind(&snapshot.niche)
        .bind(monthly)
        .bind(projection)
        .bind(snapshot.upload_frequency)
        .bind(snapshot.computed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(channel_id: &str, expires_in_hours: i64) -> CacheRecord {
        let now = Utc::now();
        CacheRecord {
            channel_id: channel_id.to_string(),
            tier: SubscriptionTier::Free,
            videos_analyzed: 0,
            total_video_count: 100,
            last_full_fetch: now,
            last_incremental_update: None,
            cache_expires_at: now + Duration::hours(expires_in_hours),
            upload_frequency: Some(1.0),
            cache_duration_hours: 168,
        }
    }

    #[tokio::test]
    async fn memory_store_round_trips_records() {
        let store = MemoryCacheStore::new();
        assert!(store.get("UC123").await.unwrap().is_none());

        let rec = record("UC123", 24);
        store.upsert(&rec).await.unwrap();
        assert_eq!(store.get("UC123").await.unwrap(), Some(rec.clone()));

        // Upsert overwrites in place.
        let mut updated = rec;
        updated.videos_analyzed = 42;
        store.upsert(&updated).await.unwrap();
        assert_eq!(
            store.get("UC123").await.unwrap().unwrap().videos_analyzed,
            42
        );
    }

    fn snapshot(channel_id: &str) -> AnalysisSnapshot {
        AnalysisSnapshot {
            channel_id: channel_id.to_string(),
            niche: "gaming".to_string(),
            monthly: vec![crate::models::MonthlyRevenueBucket {
                month: "2026-07".to_string(),
                long_form_views: 12_000,
                shorts_views: 3_000,
                long_form_revenue: 54.0,
                shorts_revenue: 0.3,
            }],
            projection: Default::default(),
            upload_frequency: 2.5,
            computed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_store_sweeps_only_expired_records() {
        let store = MemoryCacheStore::new();
        store.upsert(&record("expired-a", -2)).await.unwrap();
        store.upsert(&record("expired-b", -100)).await.unwrap();
        store.upsert(&record("live", 48)).await.unwrap();

        let removed = store.delete_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("expired-a").await.unwrap().is_none());
        assert!(store.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn memory_store_round_trips_snapshots() {
        let store = MemoryCacheStore::new();
        assert!(store.get_snapshot("UC123").await.unwrap().is_none());

        let snap = snapshot("UC123");
        store.put_snapshot(&snap).await.unwrap();
        assert_eq!(store.get_snapshot("UC123").await.unwrap(), Some(snap.clone()));

        let mut updated = snap;
        updated.upload_frequency = 9.0;
        store.put_snapshot(&updated).await.unwrap();
        assert_eq!(
            store
                .get_snapshot("UC123")
                .await
                .unwrap()
                .unwrap()
                .upload_frequency,
            9.0
        );
    }

    #[tokio::test]
    async fn sweep_removes_snapshots_of_swept_channels() {
        let store = MemoryCacheStore::new();
        store.upsert(&record("gone", -1)).await.unwrap();
        store.put_snapshot(&snapshot("gone")).await.unwrap();
        store.upsert(&record("kept", 48)).await.unwrap();
        store.put_snapshot(&snapshot("kept")).await.unwrap();

        store.delete_expired(Utc::now()).await.unwrap();
        assert!(store.get_snapshot("gone").await.unwrap().is_none());
        assert!(store.get_snapshot("kept").await.unwrap().is_some());
    }
}
