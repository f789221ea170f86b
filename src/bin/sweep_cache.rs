// src/bin/sweep_cache.rs
use std::sync::Arc;

use channel_analytics::services::cache::CacheTierManager;
use channel_analytics::services::store::PgCacheStore;
use dotenv::dotenv;
use std::env;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let database_url = env::var("DATABASE_URL")?;
    let store = Arc::new(PgCacheStore::new(&database_url).await?);
    let manager = CacheTierManager::new(store);

    let removed = manager.sweep_expired().await?;
    println!("Sweep complete, removed {} expired records", removed);
    Ok(())
}
