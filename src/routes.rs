// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;

use log::info;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::analysis::{get_channel_analysis, AnalysisQuery};
use crate::handlers::cache_admin::run_cache_sweep;
use crate::handlers::error::ApiError;
use crate::handlers::tiers::get_tiers;
use crate::state::AppState;

// Add recovery handling for our custom errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status();
        message = api_error.message.clone();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let analysis_route = warp::path!("api" / "v1" / "channel" / String / "analysis")
        .and(warp::get())
        .and(warp::query::<AnalysisQuery>())
        .and(state_filter.clone())
        .and_then(get_channel_analysis);

    let tiers_route = warp::path!("api" / "v1" / "tiers")
        .and(warp::get())
        .and_then(get_tiers);

    let sweep_route = warp::path!("api" / "v1" / "cache" / "sweep")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(run_cache_sweep);

    info!("All routes configured successfully.");

    analysis_route
        .or(tiers_route)
        .or(sweep_route)
        .recover(handle_rejection)
}
