// src/handlers/tiers.rs
use warp::reply::Json;
use warp::Rejection;

use crate::services::cache::CacheTierManager;

pub async fn get_tiers() -> Result<Json, Rejection> {
    Ok(warp::reply::json(&CacheTierManager::tier_table()))
}
