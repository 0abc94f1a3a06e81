//! Application state for the card shop

use std::sync::Arc;

use shared::error::AppError;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::DbService;
use crate::services::ShopRules;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool (migrated)
    pub pool: SqlitePool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the database and run migrations; traffic may be served afterwards.
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let db = DbService::new(&config.database_url, config.db_max_connections).await?;
        Ok(Self::with_pool(db.pool, config.clone()))
    }

    pub fn with_pool(pool: SqlitePool, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub fn rules(&self) -> ShopRules {
        self.config.rules()
    }
}
