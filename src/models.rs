// src/models.rs
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Subscription tier. Determines how many videos the fetch layer may pull
/// from the upstream API for a single channel analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Standard,
    Premium,
}

impl SubscriptionTier {
    pub fn all() -> [SubscriptionTier; 3] {
        [Self::Free, Self::Standard, Self::Premium]
    }

    pub fn video_limit(&self) -> usize {
        match self {
            Self::Free => 250,
            Self::Standard => 1000,
            Self::Premium => 5000,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Free => "Trial access, most recent 250 videos analyzed",
            Self::Standard => "Up to 1000 videos analyzed per channel",
            Self::Premium => "Full catalog analysis, up to 5000 videos",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown subscription tier: {}", other)),
        }
    }
}

/// One fetched video's statistics. Created per analysis run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoObservation {
    pub id: String,
    pub view_count: u64,
    pub published_at: DateTime<Utc>,
    pub is_short: bool,
}

/// Views and estimated revenue for one calendar month, split by format.
/// Only months with at least one observed view are ever emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenueBucket {
    /// "YYYY-MM" of the publish month.
    pub month: String,
    pub long_form_views: u64,
    pub shorts_views: u64,
    pub long_form_revenue: f64,
    pub shorts_revenue: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub views: u64,
    pub revenue: f64,
}

/// Forward projection from the trailing three monthly buckets. All-zero when
/// fewer than three buckets of history exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub next_month: ProjectionPoint,
    pub next_year: ProjectionPoint,
}

/// Per-channel cache metadata row. Owned exclusively by the caching
/// subsystem; created on first analysis, overwritten on every later fetch,
/// removed only by the expiry sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub channel_id: String,
    pub tier: SubscriptionTier,
    pub videos_analyzed: i64,
    pub total_video_count: i64,
    pub last_full_fetch: DateTime<Utc>,
    pub last_incremental_update: Option<DateTime<Utc>>,
    pub cache_expires_at: DateTime<Utc>,
    pub upload_frequency: Option<f64>,
    pub cache_duration_hours: i64,
}

/// Last computed analysis for a channel, kept alongside its [`CacheRecord`]
/// so incremental fetches extend prior history instead of replacing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub channel_id: String,
    pub niche: String,
    pub monthly: Vec<MonthlyRevenueBucket>,
    pub projection: ProjectionResult,
    pub upload_frequency: f64,
    pub computed_at: DateTime<Utc>,
}

/// Response shape for the main analysis endpoint.
#[derive(Debug, Serialize)]
pub struct ChannelAnalysis {
    pub channel_id: String,
    pub tier: SubscriptionTier,
    pub niche: String,
    pub videos_analyzed: i64,
    pub total_video_count: i64,
    pub upload_frequency_per_week: f64,
    pub monthly: Vec<MonthlyRevenueBucket>,
    pub projection: ProjectionResult,
    pub cache_expires_at: DateTime<Utc>,
    pub full_refetch: bool,
}

#[derive(Debug, Serialize)]
pub struct TierInfo {
    pub tier: SubscriptionTier,
    pub video_limit: usize,
    pub description: &'static str,
}
