// src/handlers/analysis.rs
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use serde::Deserialize;
use warp::Rejection;

use crate::models::{
    AnalysisSnapshot, ChannelAnalysis, MonthlyRevenueBucket, ProjectionResult, SubscriptionTier,
    VideoObservation,
};
use crate::services::cache::CacheTierManager;
use crate::services::revenue::{self, DEFAULT_FREQUENCY_WINDOW_MONTHS};
use crate::services::rpm::{NicheRpmTable, GENERAL_NICHE};
use crate::state::AppState;
use super::error::ApiError;

/// Months of history covered by one analysis.
const ANALYSIS_WINDOW_MONTHS: usize = 12;

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub tier: Option<String>,
    pub niche: Option<String>,
}

/// Build the response analytics. On an incremental pass the stored analysis
/// is the base and the freshly fetched tail is folded into it; a full pass
/// computes everything from the fetched observations. Upload frequency needs
/// individual publish times, so it is only remeasured on a full pass.
fn compose_analysis(
    rpm: &NicheRpmTable,
    stored: Option<&AnalysisSnapshot>,
    observations: &[VideoObservation],
    niche: &str,
) -> (Vec<MonthlyRevenueBucket>, ProjectionResult, f64) {
    let (monthly, frequency) = match stored {
        Some(snapshot) => {
            let monthly = revenue::merge_bucket_history(
                rpm,
                &snapshot.monthly,
                observations,
                niche,
                ANALYSIS_WINDOW_MONTHS,
            );
            (monthly, snapshot.upload_frequency)
        }
        None => {
            let monthly =
                revenue::build_historical_buckets(rpm, observations, niche, ANALYSIS_WINDOW_MONTHS);
            let frequency =
                revenue::upload_frequency(observations, DEFAULT_FREQUENCY_WINDOW_MONTHS);
            (monthly, frequency)
        }
    };
    let projection = revenue::project_growth(&monthly);
    (monthly, projection, frequency)
}

pub async fn get_channel_analysis(
    channel_id: String,
    query: AnalysisQuery,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, Rejection> {
    let tier = match query.tier.as_deref() {
        None => SubscriptionTier::Free,
        Some(raw) => raw
            .parse::<SubscriptionTier>()
            .map_err(|e| warp::reject::custom(ApiError::bad_request(e)))?,
    };
    let niche = query.niche.unwrap_or_else(|| GENERAL_NICHE.to_string());
    info!(
        "Handling analysis request for channel {} (tier {}, niche {})",
        channel_id, tier, niche
    );

    let summary = state
        .youtube
        .fetch_channel_summary(&channel_id)
        .await
        .map_err(|e| {
            error!("Channel lookup failed for {}: {}", channel_id, e);
            warp::reject::custom(ApiError::external_error(format!(
                "Failed to resolve channel: {}",
                e
            )))
        })?;

    let refetch_due = state
        .manager
        .should_do_full_refetch(&channel_id)
        .await
        .map_err(|e| warp::reject::custom(ApiError::database_error(e.to_string())))?;

    // An incremental pass only makes sense when there is stored history to
    // extend; without it, fall back to a full pass.
    let stored = if refetch_due {
        None
    } else {
        state
            .manager
            .stored_analysis(&channel_id)
            .await
            .map_err(|e| warp::reject::custom(ApiError::database_error(e.to_string())))?
    };
    let full_refetch = refetch_due || stored.is_none();

    // Incremental fetches only pull videos newer than the last pass.
    let published_after = if full_refetch {
        None
    } else {
        state
            .manager
            .cached_record(&channel_id)
            .await
            .map_err(|e| warp::reject::custom(ApiError::database_error(e.to_string())))?
            .map(|r| r.last_incremental_update.unwrap_or(r.last_full_fetch))
    };
    debug!(
        "Fetch plan for {}: full_refetch={}, published_after={:?}",
        channel_id, full_refetch, published_after
    );

    let limit = CacheTierManager::video_limit(tier);
    let observations = state
        .youtube
        .fetch_observations(&summary.uploads_playlist_id, limit, published_after)
        .await
        .map_err(|e| {
            error!("Video fetch failed for {}: {}", channel_id, e);
            warp::reject::custom(ApiError::external_error(format!(
                "Failed to fetch videos: {}",
                e
            )))
        })?;

    let (monthly, projection, frequency) =
        compose_analysis(state.rpm, stored.as_ref(), &observations, &niche);
    let observed_frequency = if stored.is_none() && observations.is_empty() {
        None
    } else {
        Some(frequency)
    };

    state
        .manager
        .get_or_create_record(&channel_id, tier, summary.total_video_count, observed_frequency)
        .await
        .map_err(|e| warp::reject::custom(ApiError::database_error(e.to_string())))?;
    let record = state
        .manager
        .record_fetch_completion(&channel_id, observations.len() as i64, !full_refetch)
        .await
        .map_err(|e| warp::reject::custom(ApiError::database_error(e.to_string())))?;

    state
        .manager
        .store_analysis(&AnalysisSnapshot {
            channel_id: channel_id.clone(),
            niche: niche.clone(),
            monthly: monthly.clone(),
            projection,
            upload_frequency: frequency,
            computed_at: Utc::now(),
        })
        .await
        .map_err(|e| warp::reject::custom(ApiError::database_error(e.to_string())))?;

    info!(
        "Analyzed {} new videos for channel {} ({} active months, full_refetch={})",
        observations.len(),
        channel_id,
        monthly.len(),
        full_refetch
    );

    Ok(warp::reply::json(&ChannelAnalysis {
        channel_id,
        tier,
        niche,
        videos_analyzed: record.videos_analyzed,
        total_video_count: summary.total_video_count,
        upload_frequency_per_week: frequency,
        monthly,
        projection,
        cache_expires_at: record.cache_expires_at,
        full_refetch,
    }))
}
