use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Asset rows are owned by the upload pipeline; only the counter
        // columns are written here.
        manager
            .create_table(
                Table::create()
                    .table(UploadedAssets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UploadedAssets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UploadedAssets::Filename).string().not_null())
                    .col(ColumnDef::new(UploadedAssets::Bucket).string().not_null())
                    .col(ColumnDef::new(UploadedAssets::Path).string().not_null())
                    .col(
                        ColumnDef::new(UploadedAssets::Size)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UploadedAssets::MimeType).string())
                    .col(
                        ColumnDef::new(UploadedAssets::AssetKind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UploadedAssets::DownloadCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UploadedAssets::BandwidthUsed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UploadedAssets::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(UploadedAssets::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(UploadedAssets::LastAccessed).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploaded_assets_path")
                    .table(UploadedAssets::Table)
                    .col(UploadedAssets::Path)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploaded_assets_bucket")
                    .table(UploadedAssets::Table)
                    .col(UploadedAssets::Bucket)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CacheEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CacheEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CacheEntries::Path).string().not_null())
                    .col(ColumnDef::new(CacheEntries::CacheKey).string().not_null())
                    .col(
                        ColumnDef::new(CacheEntries::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheEntries::MissCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheEntries::BytesServed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CacheEntries::IsCached)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(CacheEntries::CacheSize).big_integer())
                    .col(ColumnDef::new(CacheEntries::FirstCached).timestamp())
                    .col(ColumnDef::new(CacheEntries::LastHit).timestamp())
                    .col(ColumnDef::new(CacheEntries::LastMiss).timestamp())
                    .col(
                        ColumnDef::new(CacheEntries::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CacheEntries::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cache_entries_path")
                    .table(CacheEntries::Table)
                    .col(CacheEntries::Path)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cache_entries_last_miss")
                    .table(CacheEntries::Table)
                    .col(CacheEntries::LastMiss)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BandwidthBuckets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BandwidthBuckets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Hour)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Requests)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::BytesSent)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::CacheHits)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::CacheMisses)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Status200)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Status206)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Status304)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Status404)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::Status5xx)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BandwidthBuckets::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bandwidth_buckets_hour")
                    .table(BandwidthBuckets::Table)
                    .col(BandwidthBuckets::Hour)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurgeRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurgeRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PurgeRecords::PurgeType).string().not_null())
                    .col(ColumnDef::new(PurgeRecords::Target).string().not_null())
                    .col(
                        ColumnDef::new(PurgeRecords::FilesPurged)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PurgeRecords::BytesFreed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PurgeRecords::TriggeredBy)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurgeRecords::Reason).text())
                    .col(
                        ColumnDef::new(PurgeRecords::Success)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(PurgeRecords::ErrorMessage).text())
                    .col(
                        ColumnDef::new(PurgeRecords::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(PurgeRecords::CompletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purge_records_created_at")
                    .table(PurgeRecords::Table)
                    .col(PurgeRecords::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurgeRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BandwidthBuckets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CacheEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UploadedAssets::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum UploadedAssets {
    Table,
    Id,
    Filename,
    Bucket,
    Path,
    Size,
    MimeType,
    AssetKind,
    DownloadCount,
    BandwidthUsed,
    IsActive,
    CreatedAt,
    LastAccessed,
}

#[derive(DeriveIden)]
enum CacheEntries {
    Table,
    Id,
    Path,
    CacheKey,
    HitCount,
    MissCount,
    BytesServed,
    IsCached,
    CacheSize,
    FirstCached,
    LastHit,
    LastMiss,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BandwidthBuckets {
    Table,
    Id,
    Hour,
    Requests,
    BytesSent,
    CacheHits,
    CacheMisses,
    #[sea_orm(iden = "status_200")]
    Status200,
    #[sea_orm(iden = "status_206")]
    Status206,
    #[sea_orm(iden = "status_304")]
    Status304,
    #[sea_orm(iden = "status_404")]
    Status404,
    #[sea_orm(iden = "status_5xx")]
    Status5xx,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PurgeRecords {
    Table,
    Id,
    PurgeType,
    Target,
    FilesPurged,
    BytesFreed,
    TriggeredBy,
    Reason,
    Success,
    ErrorMessage,
    CreatedAt,
    CompletedAt,
}
