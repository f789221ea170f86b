// src/bin/test_youtube.rs
use channel_analytics::services::revenue;
use channel_analytics::services::youtube::YouTubeClient;
use dotenv::dotenv;
use std::env;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    let api_key = env::var("YOUTUBE_API_KEY")?;
    let channel_id = env::args()
        .nth(1)
        .ok_or("usage: test_youtube <channel_id>")?;

    let client = YouTubeClient::new(api_key);
    let summary = client.fetch_channel_summary(&channel_id).await?;
    println!("Uploads playlist: {}", summary.uploads_playlist_id);
    println!("Total videos:     {}", summary.total_video_count);

    let observations = client
        .fetch_observations(&summary.uploads_playlist_id, 50, None)
        .await?;
    println!("Fetched {} observations:", observations.len());
    for obs in observations.iter().take(10) {
        println!(
            "  {} | {} views | {} | short={}",
            obs.id, obs.view_count, obs.published_at, obs.is_short
        );
    }

    let frequency = revenue::upload_frequency(&observations, 3);
    println!("Upload frequency: {:.2} videos/week", frequency);
    Ok(())
}
