//! Application state shared across handlers.

use chive_core::config::AppConfig;
use chive_metadata::MetadataStore;
use chive_storage::BlobStore;
use chive_versions::VersionManager;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub versions: VersionManager,
}

impl AppState {
    /// Build state, wiring the version manager over the given stores.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let versions =
            VersionManager::from_config(&config.versioning, storage.clone(), metadata.clone());
        Self {
            config: Arc::new(config),
            storage,
            metadata,
            versions,
        }
    }
}
