//! Application state management

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::store::TableStore;

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Tables served under `/rest/v1`
    pub store: RwLock<TableStore>,
}

impl AppState {
    /// Create new application state, loading the seed file
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let store = TableStore::load(&config.backend.tables, Path::new(&config.backend.seed_path))?;
        Ok(Arc::new(Self {
            config,
            store: RwLock::new(store),
        }))
    }

    /// Re-read the seed file. The current tables are kept if it is invalid.
    pub async fn reload(&self) -> Result<()> {
        let store = TableStore::load(
            &self.config.backend.tables,
            Path::new(&self.config.backend.seed_path),
        )?;
        *self.store.write().await = store;
        info!("Tables reloaded");
        Ok(())
    }
}
