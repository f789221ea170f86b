use dotenv::dotenv;
use log::{error, info, warn};
use std::env;
use std::net::SocketAddr;
use tokio_cron_scheduler::{Job, JobScheduler};
use warp::Filter;

use channel_analytics::routes;
use channel_analytics::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    // Get port from environment, default to 3030
    let port_str = env::var("PORT").unwrap_or_else(|_| {
        warn!("$PORT not set, defaulting to 3030");
        "3030".to_string()
    });

    let port: u16 = port_str.parse().expect("PORT must be a number");
    info!("Using PORT: {}", port);

    let api_key = env::var("YOUTUBE_API_KEY").expect("YOUTUBE_API_KEY must be set");
    let database_url = env::var("DATABASE_URL").ok();

    let state = AppState::new(database_url.as_deref(), api_key)
        .await
        .expect("Failed to initialize application state");

    // Sweep expired cache records every 6 hours. The read path treats
    // expired records as invalid either way; this just reclaims rows.
    let mut scheduler = JobScheduler::new()
        .await
        .expect("Failed to create job scheduler");
    let sweep_state = state.clone();
    let sweep_job = Job::new_async("0 0 */6 * * *", move |_uuid, _lock| {
        let state = sweep_state.clone();
        Box::pin(async move {
            if let Err(e) = state.manager.sweep_expired().await {
                error!("Scheduled cache sweep failed: {}", e);
            }
        })
    })
    .expect("Failed to create sweep job");
    scheduler
        .add(sweep_job)
        .await
        .expect("Failed to schedule sweep job");
    scheduler.start().await.expect("Failed to start scheduler");

    // Bind to 0.0.0.0 for container deployments
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    // Set up routes
    let api = routes::routes(state).with(cors);
    info!("Routes configured successfully with CORS.");

    // Start the server
    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
}
