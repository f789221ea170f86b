// src/services/cache.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, info};

use crate::models::{AnalysisSnapshot, CacheRecord, SubscriptionTier, TierInfo};
use super::store::{CacheStore, StorageError};

/// Fallback cache window when a channel's upload cadence is unknown.
const DEFAULT_CACHE_HOURS: i64 = 168;

/// A valid cached analysis still gets a full refetch once its last
/// incremental update is older than this, to bound drift.
const INCREMENTAL_STALENESS_HOURS: i64 = 24;

/// Decides per-channel analysis depth (by tier) and cache freshness
/// (by upload cadence), persisting decisions as [`CacheRecord`] rows.
pub struct CacheTierManager {
    store: Arc<dyn CacheStore>,
}

impl CacheTierManager {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// How long a computed analysis stays valid, in hours. Channels that
    /// publish often go stale fastest; inactive channels barely change, so
    /// long windows avoid redundant upstream calls.
    pub fn cache_duration_hours(upload_frequency: Option<f64>) -> i64 {
        match upload_frequency {
            None => DEFAULT_CACHE_HOURS,
            Some(f) if f > 7.0 => 24,
            Some(f) if f > 2.0 => 48,
            Some(f) if f > 0.5 => 168,
            Some(_) => 336,
        }
    }

    /// A missing record is always invalid.
    pub fn is_cache_valid(record: Option<&CacheRecord>) -> bool {
        match record {
            Some(r) => Utc::now() < r.cache_expires_at,
            None => false,
        }
    }

    pub fn video_limit(tier: SubscriptionTier) -> usize {
        tier.video_limit()
    }

    pub fn tier_table() -> Vec<TierInfo> {
        SubscriptionTier::all()
            .into_iter()
            .map(|tier| TierInfo {
                tier,
                video_limit: tier.video_limit(),
                description: tier.description(),
            })
            .collect()
    }

    /// Read-only view of a channel's record, if one exists.
    pub async fn cached_record(&self, channel_id: &str) -> Result<Option<CacheRecord>, StorageError> {
        self.store.get(channel_id).await
    }

    /// Fetch the channel's cache record, creating or refreshing it as
    /// needed. Three outcomes: missing -> create; valid -> returned
    /// unchanged; expired -> duration and expiry recomputed from the
    /// *current* upload frequency and the row overwritten.
    pub async fn get_or_create_record(
        &self,
        channel_id: &str,
        tier: SubscriptionTier,
        total_video_count: i64,
        upload_frequency: Option<f64>,
    ) -> Result<CacheRecord, StorageError> {
        let existing = match self.store.get(channel_id).await? {
            Some(record) if Self::is_cache_valid(Some(&record)) => {
                debug!("Cache hit for channel {}", channel_id);
                return Ok(record);
            }
            other => other,
        };

        let now = Utc::now();
        let duration_hours = Self::cache_duration_hours(upload_frequency);
        let record = match existing {
            None => {
                info!(
                    "Creating cache record for channel {} ({}h window)",
                    channel_id, duration_hours
                );
                CacheRecord {
                    channel_id: channel_id.to_string(),
                    tier,
                    videos_analyzed: 0,
                    total_video_count,
                    last_full_fetch: now,
                    last_incremental_update: None,
                    cache_expires_at: now + Duration::hours(duration_hours),
                    upload_frequency,
                    cache_duration_hours: duration_hours,
                }
            }
            Some(stale) => {
                info!(
                    "Cache expired for channel {}, refreshing ({}h window)",
                    channel_id, duration_hours
                );
                CacheRecord {
                    tier,
                    total_video_count,
                    last_full_fetch: now,
                    cache_expires_at: now + Duration::hours(duration_hours),
                    upload_frequency,
                    cache_duration_hours: duration_hours,
                    ..stale
                }
            }
        };

        self.store.upsert(&record).await?;
        Ok(record)
    }

    /// Whether the next fetch must cover the whole catalog. True when
    /// nothing is cached, the cache has expired, or a valid cache has been
    /// running on incremental updates for longer than 24 hours.
    pub async fn should_do_full_refetch(&self, channel_id: &str) -> Result<bool, StorageError> {
        let record = self.store.get(channel_id).await?;
        let record = match record {
            None => return Ok(true),
            Some(r) => r,
        };

        if Utc::now() >= record.cache_expires_at {
            return Ok(true);
        }

        match record.last_incremental_update {
            None => Ok(false),
            Some(last) => {
                Ok(Utc::now() - last > Duration::hours(INCREMENTAL_STALENESS_HOURS))
            }
        }
    }

    /// Stamp a finished fetch on the record. A full fetch re-establishes the
    /// analyzed count; an incremental fetch extends it. Expiry is
    /// deliberately left alone; only [`Self::get_or_create_record`]
    /// recomputes it.
    pub async fn record_fetch_completion(
        &self,
        channel_id: &str,
        videos_analyzed: i64,
        is_incremental: bool,
    ) -> Result<CacheRecord, StorageError> {
        let mut record = self
            .store
            .get(channel_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(channel_id.to_string()))?;

        if is_incremental {
            record.videos_analyzed += videos_analyzed;
            record.last_incremental_update = Some(Utc::now());
        } else {
            record.videos_analyzed = videos_analyzed;
            record.last_full_fetch = Utc::now();
        }

        self.store.upsert(&record).await?;
        Ok(record)
    }

    /// Last stored analysis for a channel, if any.
    pub async fn stored_analysis(
        &self,
        channel_id: &str,
    ) -> Result<Option<AnalysisSnapshot>, StorageError> {
        self.store.get_snapshot(channel_id).await
    }

    /// Persist a computed analysis so later incremental fetches can extend
    /// it instead of starting from an empty history.
    pub async fn store_analysis(&self, snapshot: &AnalysisSnapshot) -> Result<(), StorageError> {
        self.store.put_snapshot(snapshot).await
    }

    /// Remove expired rows. Housekeeping only: the read path already
    /// treats expired records as invalid.
    pub async fn sweep_expired(&self) -> Result<u64, StorageError> {
        let removed = self.store.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!("Swept {} expired cache records", removed);
        }
        Ok(removed)
    }
}
