pub mod purge_repository;
pub mod stats_repository;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Base repository implementation holder
#[derive(Debug)]
pub struct BaseRepository {
    pub db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

// Re-export specific repositories
pub use purge_repository::{NewPurgeRecord, PurgeRepository, PurgeRepositoryImpl};
pub use stats_repository::{AssetTotals, CacheTotals, StatsRepository};
