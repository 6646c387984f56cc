//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::metadata::{self, MetadataSource};

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Both fields are read-only after startup; requests share no mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metadata: Arc<dyn MetadataSource>,
}

impl AppState {
    /// Creates state with the metadata source described by the configuration.
    pub fn new(config: AppConfig) -> Self {
        let metadata = metadata::source_from_config(&config.metadata);
        Self::with_metadata(config, metadata)
    }

    /// Creates state around an explicit metadata source.
    pub fn with_metadata(config: AppConfig, metadata: Arc<dyn MetadataSource>) -> Self {
        Self {
            config: Arc::new(config),
            metadata,
        }
    }
}
