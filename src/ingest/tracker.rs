use anyhow::Result;
use sea_orm::{Set, TransactionTrait};
use tracing::{debug, info};

use super::aggregator::{AggregationReport, AggregationService};
use super::batch::{BandwidthDelta, CacheDelta, truncate_to_hour};
use super::classifier::cache_outcome;
use super::parser::CacheStatus;
use crate::config::IngestConfig;
use crate::db::DatabaseConnection;
use crate::db::entities::UploadedAssetActiveModel;
use crate::db::repository::StatsRepository;
use crate::error::Error;

/// Live event ingest: single download / cache events pushed synchronously
/// by the serving layer, applied through the same counter-store primitives
/// as the batch aggregator.
pub struct TrackerService;

impl TrackerService {
    /// Record one download of a known asset. Fails with `NotFound` before
    /// any counter moves when the asset id is unknown.
    pub async fn record_download(
        db: &DatabaseConnection,
        asset_id: i32,
        bytes_sent: i64,
        cache_status: CacheStatus,
    ) -> Result<(), Error> {
        let txn = db.begin().await?;

        let Some(asset) = StatsRepository::find_asset(&txn, asset_id).await? else {
            return Err(Error::NotFound(format!("asset {}", asset_id)));
        };

        let now = chrono::Utc::now().naive_utc();
        let outcome = cache_outcome(cache_status);
        let delta = CacheDelta::for_event(outcome, bytes_sent);

        let mut active: UploadedAssetActiveModel = asset.clone().into();
        active.download_count = Set(asset.download_count + 1);
        active.bandwidth_used = Set(asset.bandwidth_used + bytes_sent);
        active.last_accessed = Set(Some(now));
        use sea_orm::ActiveModelTrait;
        active.update(&txn).await?;

        // A download served by the API proves nothing about edge cache
        // state, so an absent cache entry is left absent.
        StatsRepository::apply_cache_entry(&txn, &asset.path, &delta, now, false).await?;

        StatsRepository::apply_bandwidth(
            &txn,
            truncate_to_hour(now),
            &BandwidthDelta::for_live_event(bytes_sent, outcome),
        )
        .await?;

        txn.commit().await?;
        debug!("Recorded download of asset {} ({} bytes)", asset_id, bytes_sent);
        Ok(())
    }

    /// Record one cache hit/miss event for a path, creating the cache entry
    /// if this is the first event ever seen for it. Every recorded event
    /// counts as a download on an asset sharing the path.
    pub async fn record_cache_event(
        db: &DatabaseConnection,
        path: &str,
        cache_status: CacheStatus,
        bytes_sent: i64,
    ) -> Result<(), Error> {
        let now = chrono::Utc::now().naive_utc();
        let outcome = cache_outcome(cache_status);
        let delta = CacheDelta::for_event(outcome, bytes_sent);

        let txn = db.begin().await?;

        StatsRepository::apply_cache_and_asset(&txn, path, &delta, now).await?;
        StatsRepository::apply_bandwidth(
            &txn,
            truncate_to_hour(now),
            &BandwidthDelta::for_live_event(bytes_sent, outcome),
        )
        .await?;

        txn.commit().await?;
        debug!("Recorded {} for {} ({} bytes)", cache_status, path, bytes_sent);
        Ok(())
    }

    /// Kick off an aggregation pass. Background mode acknowledges
    /// immediately with `None`; blocking mode returns the full report.
    pub async fn trigger_aggregation(
        db: &DatabaseConnection,
        config: &IngestConfig,
        background: bool,
    ) -> Result<Option<AggregationReport>> {
        if background {
            AggregationService::spawn(db.clone(), config.clone());
            info!("Aggregation dispatched to background");
            Ok(None)
        } else {
            AggregationService::run(db, config).await.map(Some)
        }
    }
}
