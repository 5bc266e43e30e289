use std::sync::Arc;

use larder_db::Database;
use tracing::error;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: String, token_ttl: chrono::Duration) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret,
            token_ttl,
        })
    }
}

/// Runs store work off the async runtime.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
}
