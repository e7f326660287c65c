use std::sync::Arc;

use pricepromo_core::config::{AppConfig, ConfigError, LoadOptions};
use pricepromo_core::snapshot::SnapshotStore;
use thiserror::Error;
use tokio::sync::Mutex;

/// Shared by every handler. The upload lock admits one pipeline run at a time.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SnapshotStore>,
    pub upload_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(SnapshotStore::new()),
            upload_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    Ok(bootstrap_with_config(config))
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let state = AppState::new(config.clone());
    Application { config, state }
}
