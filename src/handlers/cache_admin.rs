// src/handlers/cache_admin.rs
use std::sync::Arc;

use log::{error, info};
use serde_json::json;
use warp::Rejection;

use crate::state::AppState;
use super::error::ApiError;

/// Manual trigger for the expired-record sweep. The same sweep also runs on
/// the cron schedule wired up in main.
pub async fn run_cache_sweep(state: Arc<AppState>) -> Result<impl warp::Reply, Rejection> {
    match state.manager.sweep_expired().await {
        Ok(removed) => {
            info!("Manual cache sweep removed {} records", removed);
            Ok(warp::reply::json(&json!({ "removed": removed })))
        }
        Err(e) => {
            error!("Manual cache sweep failed: {}", e);
            Err(warp::reject::custom(ApiError::database_error(e.to_string())))
        }
    }
}
