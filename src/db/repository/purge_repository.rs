use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};

use super::BaseRepository;
use crate::db::DatabaseConnection;
use crate::db::entities::{
    CacheEntry, PurgeRecord, PurgeRecordActiveModel, PurgeRecordModel, PurgeType, cache_entries,
};

/// Fields of a purge audit row known at completion time.
#[derive(Debug, Clone)]
pub struct NewPurgeRecord {
    pub purge_type: PurgeType,
    pub target: String,
    pub files_purged: i32,
    pub bytes_freed: i64,
    pub triggered_by: String,
    pub reason: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
}

/// Repository for purge audit rows and the cached-flag reconciliation that
/// accompanies every purge.
#[async_trait]
pub trait PurgeRepository: Send + Sync {
    /// Append one immutable audit row.
    async fn record_purge(&self, record: NewPurgeRecord) -> Result<PurgeRecordModel, DbErr>;

    /// Recent purge operations, newest first.
    async fn history(&self, limit: u64) -> Result<Vec<PurgeRecordModel>, DbErr>;

    /// Flip `is_cached` off for the exact path. Returns rows affected.
    async fn mark_path_uncached(&self, path: &str) -> Result<u64, DbErr>;

    /// Flip `is_cached` off for every entry under `/<bucket>/`.
    async fn mark_bucket_uncached(&self, bucket: &str) -> Result<u64, DbErr>;

    /// Flip `is_cached` off for every entry whose path contains `pattern`.
    async fn mark_pattern_uncached(&self, pattern: &str) -> Result<u64, DbErr>;

    /// Flip `is_cached` off everywhere.
    async fn mark_all_uncached(&self) -> Result<u64, DbErr>;
}

#[derive(Debug)]
pub struct PurgeRepositoryImpl {
    base: BaseRepository,
}

impl PurgeRepositoryImpl {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn mark_uncached(
        &self,
        filter: Option<sea_orm::sea_query::SimpleExpr>,
    ) -> Result<u64, DbErr> {
        let now = chrono::Utc::now().naive_utc();
        let mut update = CacheEntry::update_many()
            .col_expr(cache_entries::Column::IsCached, Expr::value(false))
            .col_expr(cache_entries::Column::UpdatedAt, Expr::value(now));

        if let Some(condition) = filter {
            update = update.filter(condition);
        }

        let result = update.exec(self.base.db.as_ref()).await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl PurgeRepository for PurgeRepositoryImpl {
    async fn record_purge(&self, record: NewPurgeRecord) -> Result<PurgeRecordModel, DbErr> {
        let active = PurgeRecordActiveModel {
            id: sea_orm::NotSet,
            purge_type: Set(record.purge_type.to_string()),
            target: Set(record.target),
            files_purged: Set(record.files_purged),
            bytes_freed: Set(record.bytes_freed),
            triggered_by: Set(record.triggered_by),
            reason: Set(record.reason),
            success: Set(record.success),
            error_message: Set(record.error_message),
            created_at: Set(record.created_at),
            completed_at: Set(Some(record.completed_at)),
        };

        use sea_orm::ActiveModelTrait;
        active.insert(self.base.db.as_ref()).await
    }

    async fn history(&self, limit: u64) -> Result<Vec<PurgeRecordModel>, DbErr> {
        PurgeRecord::find()
            .order_by_desc(crate::db::entities::purge_records::Column::CreatedAt)
            .limit(limit)
            .all(self.base.db.as_ref())
            .await
    }

    async fn mark_path_uncached(&self, path: &str) -> Result<u64, DbErr> {
        self.mark_uncached(Some(cache_entries::Column::Path.eq(path)))
            .await
    }

    async fn mark_bucket_uncached(&self, bucket: &str) -> Result<u64, DbErr> {
        self.mark_uncached(Some(
            cache_entries::Column::Path.like(format!("/{}/%", bucket)),
        ))
        .await
    }

    async fn mark_pattern_uncached(&self, pattern: &str) -> Result<u64, DbErr> {
        self.mark_uncached(Some(cache_entries::Column::Path.contains(pattern)))
            .await
    }

    async fn mark_all_uncached(&self) -> Result<u64, DbErr> {
        self.mark_uncached(None).await
    }
}
