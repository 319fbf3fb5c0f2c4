use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::infrastructure::{auth::JwtKeys, config::Config, db::PgPool, storage::StorageBackend};

/// Shared by every handler through an `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub storage: Arc<dyn StorageBackend>,
    pub jwt_keys: JwtKeys,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        let jwt_keys = JwtKeys::new(&config.auth.jwt_secret);
        Self {
            config,
            pool,
            storage,
            jwt_keys,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
