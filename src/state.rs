// src/state.rs
use std::sync::Arc;

use log::{info, warn};

use crate::services::cache::CacheTierManager;
use crate::services::rpm::NicheRpmTable;
use crate::services::store::{CacheStore, MemoryCacheStore, PgCacheStore};
use crate::services::youtube::YouTubeClient;
use crate::BoxError;

/// Shared application state handed to every handler.
pub struct AppState {
    pub manager: CacheTierManager,
    pub youtube: YouTubeClient,
    pub rpm: &'static NicheRpmTable,
}

impl AppState {
    pub async fn new(database_url: Option<&str>, api_key: String) -> Result<Arc<Self>, BoxError> {
        let store: Arc<dyn CacheStore> = match database_url {
            Some(url) => {
                info!("Connecting to Postgres cache store");
                Arc::new(PgCacheStore::new(url).await?)
            }
            None => {
                warn!("DATABASE_URL not set, falling back to in-memory cache store");
                Arc::new(MemoryCacheStore::new())
            }
        };

        Ok(Arc::new(Self {
            manager: CacheTierManager::new(store),
            youtube: YouTubeClient::new(api_key),
            rpm: NicheRpmTable::builtin(),
        }))
    }
}
