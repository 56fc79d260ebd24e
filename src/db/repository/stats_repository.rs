use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::db::entities::{
    BandwidthBucket, BandwidthBucketActiveModel, BandwidthBucketModel, CacheEntry,
    CacheEntryActiveModel, CacheEntryModel, UploadedAsset, UploadedAssetActiveModel,
    UploadedAssetModel, bandwidth_buckets, cache_entries, uploaded_assets,
};
use crate::ingest::batch::{BandwidthDelta, CacheDelta};

/// The counter store. Both ingestion paths (batch aggregation and the live
/// event API) mutate counters exclusively through these primitives, so the
/// two can never diverge in semantics. Every function takes the connection
/// or transaction it should run on; atomicity is the caller's transaction
/// boundary.
pub struct StatsRepository;

impl StatsRepository {
    /// Locate or create the bucket row for `hour` and add `delta` to it.
    pub async fn apply_bandwidth<C: ConnectionTrait>(
        conn: &C,
        hour: NaiveDateTime,
        delta: &BandwidthDelta,
    ) -> Result<BandwidthBucketModel, DbErr> {
        let existing = BandwidthBucket::find()
            .filter(bandwidth_buckets::Column::Hour.eq(hour))
            .one(conn)
            .await?;

        match existing {
            Some(bucket) => {
                let mut active: BandwidthBucketActiveModel = bucket.clone().into();
                active.requests = Set(bucket.requests + delta.requests);
                active.bytes_sent = Set(bucket.bytes_sent + delta.bytes_sent);
                active.cache_hits = Set(bucket.cache_hits + delta.cache_hits);
                active.cache_misses = Set(bucket.cache_misses + delta.cache_misses);
                active.status_200 = Set(bucket.status_200 + delta.status_200);
                active.status_206 = Set(bucket.status_206 + delta.status_206);
                active.status_304 = Set(bucket.status_304 + delta.status_304);
                active.status_404 = Set(bucket.status_404 + delta.status_404);
                active.status_5xx = Set(bucket.status_5xx + delta.status_5xx);
                active.update(conn).await
            }
            None => {
                let active = BandwidthBucketActiveModel {
                    id: sea_orm::NotSet,
                    hour: Set(hour),
                    requests: Set(delta.requests),
                    bytes_sent: Set(delta.bytes_sent),
                    cache_hits: Set(delta.cache_hits),
                    cache_misses: Set(delta.cache_misses),
                    status_200: Set(delta.status_200),
                    status_206: Set(delta.status_206),
                    status_304: Set(delta.status_304),
                    status_404: Set(delta.status_404),
                    status_5xx: Set(delta.status_5xx),
                    created_at: Set(chrono::Utc::now().naive_utc()),
                };
                active.insert(conn).await
            }
        }
    }

    /// Locate or create the cache entry for `path`, apply the delta, and
    /// forward the downloads to the asset sharing that path when one exists.
    pub async fn apply_cache_and_asset<C: ConnectionTrait>(
        conn: &C,
        path: &str,
        delta: &CacheDelta,
        now: NaiveDateTime,
    ) -> Result<CacheEntryModel, DbErr> {
        let entry = Self::apply_cache_entry(conn, path, delta, now, true).await?;
        Self::apply_asset_by_path(conn, path, delta, now).await?;
        // apply_cache_entry with create=true always yields a row
        entry.ok_or_else(|| DbErr::RecordNotFound(format!("cache entry for {}", path)))
    }

    /// Apply a delta to the cache entry for `path`. With `create` unset the
    /// call is a no-op when no entry exists (returns `None`).
    pub async fn apply_cache_entry<C: ConnectionTrait>(
        conn: &C,
        path: &str,
        delta: &CacheDelta,
        now: NaiveDateTime,
        create: bool,
    ) -> Result<Option<CacheEntryModel>, DbErr> {
        let existing = Self::find_cache_entry(conn, path).await?;

        let entry = match existing {
            Some(entry) => entry,
            None if create => {
                let active = CacheEntryActiveModel {
                    id: sea_orm::NotSet,
                    path: Set(path.to_string()),
                    cache_key: Set(CacheEntryModel::default_cache_key(path)),
                    hit_count: Set(0),
                    miss_count: Set(0),
                    bytes_served: Set(0),
                    is_cached: Set(false),
                    cache_size: Set(None),
                    first_cached: Set(None),
                    last_hit: Set(None),
                    last_miss: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(conn).await?
            }
            None => return Ok(None),
        };

        let mut active: CacheEntryActiveModel = entry.clone().into();
        active.hit_count = Set(entry.hit_count + delta.hits);
        active.miss_count = Set(entry.miss_count + delta.misses);
        active.bytes_served = Set(entry.bytes_served + delta.bytes_served);
        if delta.hits > 0 {
            active.is_cached = Set(true);
            active.last_hit = Set(Some(now));
            if entry.first_cached.is_none() {
                active.first_cached = Set(Some(now));
            }
        }
        if delta.misses > 0 {
            active.last_miss = Set(Some(now));
        }
        active.updated_at = Set(now);

        active.update(conn).await.map(Some)
    }

    /// Forward a delta to the `uploaded_assets` row with the given path.
    /// Log-derived paths may reference assets created outside this system,
    /// so an absent row is not an error. Returns whether a row was updated.
    pub async fn apply_asset_by_path<C: ConnectionTrait>(
        conn: &C,
        path: &str,
        delta: &CacheDelta,
        now: NaiveDateTime,
    ) -> Result<bool, DbErr> {
        let Some(asset) = Self::find_asset_by_path(conn, path).await? else {
            return Ok(false);
        };

        Self::apply_asset(conn, asset, delta, now).await?;
        Ok(true)
    }

    /// Apply a delta to a known asset row: one download per event, bytes to
    /// bandwidth, last-accessed stamped.
    pub async fn apply_asset<C: ConnectionTrait>(
        conn: &C,
        asset: UploadedAssetModel,
        delta: &CacheDelta,
        now: NaiveDateTime,
    ) -> Result<UploadedAssetModel, DbErr> {
        let mut active: UploadedAssetActiveModel = asset.clone().into();
        active.download_count = Set(asset.download_count + delta.events);
        active.bandwidth_used = Set(asset.bandwidth_used + delta.bytes_served);
        active.last_accessed = Set(Some(now));
        active.update(conn).await
    }

    // Lookups

    pub async fn find_cache_entry<C: ConnectionTrait>(
        conn: &C,
        path: &str,
    ) -> Result<Option<CacheEntryModel>, DbErr> {
        CacheEntry::find()
            .filter(cache_entries::Column::Path.eq(path))
            .one(conn)
            .await
    }

    pub async fn find_asset<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<UploadedAssetModel>, DbErr> {
        UploadedAsset::find_by_id(id).one(conn).await
    }

    pub async fn find_asset_by_path<C: ConnectionTrait>(
        conn: &C,
        path: &str,
    ) -> Result<Option<UploadedAssetModel>, DbErr> {
        UploadedAsset::find()
            .filter(uploaded_assets::Column::Path.eq(path))
            .one(conn)
            .await
    }

    pub async fn find_bucket<C: ConnectionTrait>(
        conn: &C,
        hour: NaiveDateTime,
    ) -> Result<Option<BandwidthBucketModel>, DbErr> {
        BandwidthBucket::find()
            .filter(bandwidth_buckets::Column::Hour.eq(hour))
            .one(conn)
            .await
    }

    // Projections read by the reporting collaborator

    pub async fn buckets_since<C: ConnectionTrait>(
        conn: &C,
        since: NaiveDateTime,
    ) -> Result<Vec<BandwidthBucketModel>, DbErr> {
        BandwidthBucket::find()
            .filter(bandwidth_buckets::Column::Hour.gte(since))
            .order_by_asc(bandwidth_buckets::Column::Hour)
            .all(conn)
            .await
    }

    pub async fn bytes_sent_since<C: ConnectionTrait>(
        conn: &C,
        since: NaiveDateTime,
    ) -> Result<i64, DbErr> {
        let total: Option<Option<i64>> = BandwidthBucket::find()
            .select_only()
            .column_as(bandwidth_buckets::Column::BytesSent.sum(), "total")
            .filter(bandwidth_buckets::Column::Hour.gte(since))
            .into_tuple()
            .one(conn)
            .await?;
        Ok(total.flatten().unwrap_or(0))
    }

    pub async fn top_assets<C: ConnectionTrait>(
        conn: &C,
        limit: u64,
    ) -> Result<Vec<UploadedAssetModel>, DbErr> {
        UploadedAsset::find()
            .filter(uploaded_assets::Column::IsActive.eq(true))
            .order_by_desc(uploaded_assets::Column::DownloadCount)
            .limit(limit)
            .all(conn)
            .await
    }

    pub async fn top_cached<C: ConnectionTrait>(
        conn: &C,
        limit: u64,
    ) -> Result<Vec<CacheEntryModel>, DbErr> {
        CacheEntry::find()
            .filter(cache_entries::Column::IsCached.eq(true))
            .order_by_desc(cache_entries::Column::HitCount)
            .limit(limit)
            .all(conn)
            .await
    }

    pub async fn recent_misses<C: ConnectionTrait>(
        conn: &C,
        limit: u64,
    ) -> Result<Vec<CacheEntryModel>, DbErr> {
        CacheEntry::find()
            .filter(cache_entries::Column::LastMiss.is_not_null())
            .order_by_desc(cache_entries::Column::LastMiss)
            .limit(limit)
            .all(conn)
            .await
    }

    pub async fn cached_entries<C: ConnectionTrait>(
        conn: &C,
        limit: u64,
        offset: u64,
    ) -> Result<(u64, Vec<CacheEntryModel>), DbErr> {
        let query = CacheEntry::find().filter(cache_entries::Column::IsCached.eq(true));
        let total = query.clone().count(conn).await?;
        let entries = query
            .order_by_desc(cache_entries::Column::LastHit)
            .offset(offset)
            .limit(limit)
            .all(conn)
            .await?;
        Ok((total, entries))
    }

    pub async fn asset_totals<C: ConnectionTrait>(conn: &C) -> Result<AssetTotals, DbErr> {
        let active = UploadedAsset::find().filter(uploaded_assets::Column::IsActive.eq(true));

        let total = active.clone().count(conn).await?;
        let images = active
            .clone()
            .filter(uploaded_assets::Column::AssetKind.eq("image"))
            .count(conn)
            .await?;
        let videos = active
            .clone()
            .filter(uploaded_assets::Column::AssetKind.eq("video"))
            .count(conn)
            .await?;

        let storage: Option<Option<i64>> = active
            .select_only()
            .column_as(uploaded_assets::Column::Size.sum(), "total")
            .into_tuple()
            .one(conn)
            .await?;

        Ok(AssetTotals {
            total,
            images,
            videos,
            storage_bytes: storage.flatten().unwrap_or(0),
        })
    }

    pub async fn cache_totals<C: ConnectionTrait>(conn: &C) -> Result<CacheTotals, DbErr> {
        let cached_files = CacheEntry::find()
            .filter(cache_entries::Column::IsCached.eq(true))
            .count(conn)
            .await?;

        let hits: Option<Option<i64>> = CacheEntry::find()
            .select_only()
            .column_as(cache_entries::Column::HitCount.sum(), "total")
            .into_tuple()
            .one(conn)
            .await?;
        let misses: Option<Option<i64>> = CacheEntry::find()
            .select_only()
            .column_as(cache_entries::Column::MissCount.sum(), "total")
            .into_tuple()
            .one(conn)
            .await?;

        Ok(CacheTotals {
            cached_files,
            total_hits: hits.flatten().unwrap_or(0),
            total_misses: misses.flatten().unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTotals {
    pub total: u64,
    pub images: u64,
    pub videos: u64,
    pub storage_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTotals {
    pub cached_files: u64,
    pub total_hits: i64,
    pub total_misses: i64,
}
