#![cfg(test)]

use crate::db::connection::Database;
use anyhow::Result;
use sea_orm::{ActiveModelTrait, DatabaseConnection as SeaOrmConnection, Set};
use std::sync::Arc;
use tempfile::TempDir;

use crate::db::entities::{UploadedAssetActiveModel, UploadedAssetModel};

/// Test database wrapper that handles setup and teardown
pub struct TestDatabase {
    pub connection: Arc<SeaOrmConnection>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new test database with migrations
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");

        let db = Database::connect(&db_path).await?;
        db.migrate().await?;

        Ok(Self {
            connection: db.get_connection(),
            _temp_dir: temp_dir,
        })
    }

    /// Get a clone of the database connection
    pub fn connection(&self) -> Arc<SeaOrmConnection> {
        self.connection.clone()
    }

    /// Seed one asset row the way the upload pipeline would.
    pub async fn insert_asset(&self, path: &str, bucket: &str, kind: &str) -> UploadedAssetModel {
        let filename = path.rsplit('/').next().unwrap_or(path).to_string();
        let active = UploadedAssetActiveModel {
            id: sea_orm::NotSet,
            filename: Set(filename),
            bucket: Set(bucket.to_string()),
            path: Set(path.to_string()),
            size: Set(4096),
            mime_type: Set(None),
            asset_kind: Set(kind.to_string()),
            download_count: Set(0),
            bandwidth_used: Set(0),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now().naive_utc()),
            last_accessed: Set(None),
        };

        active
            .insert(self.connection.as_ref())
            .await
            .expect("Failed to insert test asset")
    }
}
