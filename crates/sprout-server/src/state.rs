//! Application state shared across handlers.

use sprout_core::config::{AppConfig, DataLayout};
use sprout_core::StoreHandle;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The one store handle; every query goes through its gate.
    pub store: Arc<StoreHandle>,
    /// Where the database, uploads, and work area live.
    pub layout: Arc<DataLayout>,
}

impl AppState {
    /// Create state around an already opened store.
    pub fn new(config: AppConfig, store: StoreHandle) -> Self {
        let layout = config.storage.layout();
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            layout: Arc::new(layout),
        }
    }
}
