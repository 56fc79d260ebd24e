use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::db::DatabaseConnection;
use crate::db::entities::CacheEntryModel;
use crate::db::repository::StatsRepository;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOverview {
    pub files: FileTotals,
    pub storage: StorageTotals,
    pub cache: CacheOverview,
    pub bandwidth: BandwidthTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTotals {
    pub total: u64,
    pub images: u64,
    pub videos: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageTotals {
    pub used_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOverview {
    pub cached_files: u64,
    pub total_hits: i64,
    pub total_misses: i64,
    pub hit_ratio: f64,
    pub disk_size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthTotals {
    pub last_24h_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBandwidth {
    pub hour: NaiveDateTime,
    pub requests: i64,
    pub bytes_sent: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub hit_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAsset {
    pub filename: String,
    pub path: String,
    pub asset_kind: String,
    pub size: i64,
    pub downloads: i64,
    pub bandwidth_used: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePerformance {
    pub top_cached: Vec<CachedPathStats>,
    pub recent_misses: Vec<RecentMiss>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPathStats {
    pub path: String,
    pub hit_count: i64,
    pub miss_count: i64,
    pub bytes_served: i64,
    pub first_cached: Option<NaiveDateTime>,
    pub last_hit: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentMiss {
    pub path: String,
    pub miss_count: i64,
    pub last_miss: Option<NaiveDateTime>,
}

/// Read projections over the counter store, consumed by the reporting
/// collaborator. Every call reads current durable state fresh.
pub struct StatsService;

impl StatsService {
    pub async fn overview(db: &DatabaseConnection, cache_root: &Path) -> Result<StatsOverview> {
        let assets = StatsRepository::asset_totals(db.as_ref())
            .await
            .context("Failed to read asset totals")?;
        let cache = StatsRepository::cache_totals(db.as_ref())
            .await
            .context("Failed to read cache totals")?;

        let since = chrono::Utc::now().naive_utc() - chrono::Duration::days(1);
        let last_24h_bytes = StatsRepository::bytes_sent_since(db.as_ref(), since)
            .await
            .context("Failed to read bandwidth totals")?;

        Ok(StatsOverview {
            files: FileTotals {
                total: assets.total,
                images: assets.images,
                videos: assets.videos,
            },
            storage: StorageTotals {
                used_bytes: assets.storage_bytes,
            },
            cache: CacheOverview {
                cached_files: cache.cached_files,
                total_hits: cache.total_hits,
                total_misses: cache.total_misses,
                hit_ratio: hit_ratio(cache.total_hits, cache.total_misses),
                disk_size_bytes: disk_usage(cache_root),
            },
            bandwidth: BandwidthTotals { last_24h_bytes },
        })
    }

    pub async fn bandwidth_series(
        db: &DatabaseConnection,
        days: i64,
    ) -> Result<Vec<HourlyBandwidth>> {
        let since = chrono::Utc::now().naive_utc() - chrono::Duration::days(days);
        let buckets = StatsRepository::buckets_since(db.as_ref(), since)
            .await
            .context("Failed to read bandwidth series")?;

        Ok(buckets
            .into_iter()
            .map(|b| HourlyBandwidth {
                hour: b.hour,
                requests: b.requests,
                bytes_sent: b.bytes_sent,
                cache_hits: b.cache_hits,
                cache_misses: b.cache_misses,
                hit_ratio: hit_ratio(b.cache_hits, b.cache_misses),
            })
            .collect())
    }

    pub async fn top_assets(db: &DatabaseConnection, limit: u64) -> Result<Vec<TopAsset>> {
        let assets = StatsRepository::top_assets(db.as_ref(), limit)
            .await
            .context("Failed to read top assets")?;

        Ok(assets
            .into_iter()
            .map(|a| TopAsset {
                filename: a.filename,
                path: a.path,
                asset_kind: a.asset_kind,
                size: a.size,
                downloads: a.download_count,
                bandwidth_used: a.bandwidth_used,
            })
            .collect())
    }

    pub async fn cache_performance(db: &DatabaseConnection) -> Result<CachePerformance> {
        let top_cached = StatsRepository::top_cached(db.as_ref(), 10)
            .await
            .context("Failed to read top cached paths")?;
        let recent_misses = StatsRepository::recent_misses(db.as_ref(), 10)
            .await
            .context("Failed to read recent misses")?;

        Ok(CachePerformance {
            top_cached: top_cached
                .into_iter()
                .map(|e| CachedPathStats {
                    path: e.path,
                    hit_count: e.hit_count,
                    miss_count: e.miss_count,
                    bytes_served: e.bytes_served,
                    first_cached: e.first_cached,
                    last_hit: e.last_hit,
                })
                .collect(),
            recent_misses: recent_misses
                .into_iter()
                .map(|e| RecentMiss {
                    path: e.path,
                    miss_count: e.miss_count,
                    last_miss: e.last_miss,
                })
                .collect(),
        })
    }

    /// Per-path cache status; `None` when the path has never been seen.
    pub async fn cache_status(
        db: &DatabaseConnection,
        path: &str,
    ) -> Result<Option<CacheEntryModel>> {
        StatsRepository::find_cache_entry(db.as_ref(), path)
            .await
            .context("Failed to read cache entry")
    }

    /// Currently-cached paths, most recently hit first.
    pub async fn cached_paths(
        db: &DatabaseConnection,
        limit: u64,
        offset: u64,
    ) -> Result<(u64, Vec<CacheEntryModel>)> {
        StatsRepository::cached_entries(db.as_ref(), limit, offset)
            .await
            .context("Failed to list cached paths")
    }
}

fn hit_ratio(hits: i64, misses: i64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    (hits as f64 / total as f64 * 10000.0).round() / 100.0
}

/// Bytes currently on disk under the cache root. Unreadable subtrees count
/// as zero; the overview is informational, not an audit.
fn disk_usage(dir: &Path) -> i64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut total = 0i64;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            total += disk_usage(&path);
        } else if let Ok(metadata) = entry.metadata() {
            total += metadata.len() as i64;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::CacheStatus;
    use crate::ingest::tracker::TrackerService;
    use crate::test_utils::TestDatabase;
    use tempfile::TempDir;

    #[tokio::test]
    async fn overview_reflects_traffic() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let root = TempDir::new().unwrap();
        db.insert_asset("/media/a.jpg", "media", "image").await;
        db.insert_asset("/videos/b.mp4", "videos", "video").await;

        TrackerService::record_cache_event(&conn, "/media/a.jpg", CacheStatus::Hit, 500)
            .await
            .unwrap();
        TrackerService::record_cache_event(&conn, "/media/a.jpg", CacheStatus::Miss, 500)
            .await
            .unwrap();

        let overview = StatsService::overview(&conn, root.path()).await.unwrap();
        assert_eq!(overview.files.total, 2);
        assert_eq!(overview.files.images, 1);
        assert_eq!(overview.files.videos, 1);
        assert_eq!(overview.cache.cached_files, 1);
        assert_eq!(overview.cache.total_hits, 1);
        assert_eq!(overview.cache.total_misses, 1);
        assert_eq!(overview.cache.hit_ratio, 50.0);
        assert_eq!(overview.bandwidth.last_24h_bytes, 1000);
    }

    #[tokio::test]
    async fn empty_store_yields_zeroes() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();

        let overview = StatsService::overview(&db.connection(), root.path())
            .await
            .unwrap();
        assert_eq!(overview.files.total, 0);
        assert_eq!(overview.cache.hit_ratio, 0.0);
        assert_eq!(overview.bandwidth.last_24h_bytes, 0);
    }

    #[tokio::test]
    async fn series_and_performance_projections() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();

        TrackerService::record_cache_event(&conn, "/media/hot.jpg", CacheStatus::Hit, 100)
            .await
            .unwrap();
        TrackerService::record_cache_event(&conn, "/media/cold.jpg", CacheStatus::Miss, 100)
            .await
            .unwrap();

        let series = StatsService::bandwidth_series(&conn, 1).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].requests, 2);
        assert_eq!(series[0].hit_ratio, 50.0);

        let perf = StatsService::cache_performance(&conn).await.unwrap();
        assert_eq!(perf.top_cached.len(), 1);
        assert_eq!(perf.top_cached[0].path, "/media/hot.jpg");
        assert_eq!(perf.recent_misses.len(), 1);
        assert_eq!(perf.recent_misses[0].path, "/media/cold.jpg");
    }

    #[tokio::test]
    async fn top_assets_orders_by_downloads() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let a = db.insert_asset("/media/a.jpg", "media", "image").await;
        db.insert_asset("/media/b.jpg", "media", "image").await;

        for _ in 0..3 {
            TrackerService::record_download(&conn, a.id, 100, CacheStatus::Hit)
                .await
                .unwrap();
        }

        let top = StatsService::top_assets(&conn, 10).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].path, "/media/a.jpg");
        assert_eq!(top[0].downloads, 3);
    }
}
