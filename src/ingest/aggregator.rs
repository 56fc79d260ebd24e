use anyhow::{Context, Result};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::batch::{AggregationBatch, truncate_to_hour};
use super::classifier::classify;
use super::parser::parse_line;
use crate::config::IngestConfig;
use crate::db::DatabaseConnection;
use crate::db::repository::StatsRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationStatus {
    Completed,
    SourceNotFound,
}

/// Result object of one aggregation pass. Callers must check `status`
/// rather than infer success from the absence of an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationReport {
    pub status: AggregationStatus,
    pub lines_processed: u64,
    pub entries_updated: u64,
    pub errors: u64,
}

impl AggregationReport {
    fn source_not_found() -> Self {
        Self {
            status: AggregationStatus::SourceNotFound,
            lines_processed: 0,
            entries_updated: 0,
            errors: 1,
        }
    }
}

/// Drives a full ingestion pass over the access log: every line runs
/// through parser and classifier, the surviving events are folded into an
/// in-memory batch, and the batch is committed in a single transaction.
pub struct AggregationService;

impl AggregationService {
    /// Blocking mode: run the pass and return the full report.
    pub async fn run(db: &DatabaseConnection, config: &IngestConfig) -> Result<AggregationReport> {
        let log_path = &config.access_log_path;

        let file = match File::open(log_path).await {
            Ok(file) => file,
            Err(e) => {
                // A missing or rotated-away log is a normal condition for an
                // hourly job, not a failure of the run.
                warn!("Access log unavailable at {:?}: {}", log_path, e);
                return Ok(AggregationReport::source_not_found());
            }
        };

        info!("Starting log aggregation from {:?}", log_path);

        let mut batch = AggregationBatch::default();
        let mut lines_processed = 0u64;
        let mut entries_updated = 0u64;

        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read access log")?
        {
            lines_processed += 1;

            let Some(event) = parse_line(&line) else {
                continue;
            };
            let Some(request) = classify(&event) else {
                continue;
            };

            batch.record(&request);
            entries_updated += 1;
        }

        let errors = Self::commit(db, &batch).await?;

        info!(
            "Aggregation complete: {} lines, {} entries updated, {} errors",
            lines_processed, entries_updated, errors
        );

        Ok(AggregationReport {
            status: AggregationStatus::Completed,
            lines_processed,
            entries_updated,
            errors,
        })
    }

    /// Detached mode: acknowledge immediately and run the identical pass on
    /// a background task, logging the eventual report. Not safe to overlap
    /// with another pass over the same source; scheduling is the caller's
    /// responsibility.
    pub fn spawn(db: DatabaseConnection, config: IngestConfig) {
        info!("Aggregation started in background");
        tokio::spawn(async move {
            match Self::run(&db, &config).await {
                Ok(report) => info!("Background aggregation finished: {:?}", report),
                Err(e) => warn!("Background aggregation failed: {:#}", e),
            }
        });
    }

    /// Commit the whole batch atomically. Per-path failures are tallied and
    /// skipped; transaction-level failures roll everything back.
    async fn commit(db: &DatabaseConnection, batch: &AggregationBatch) -> Result<u64> {
        if batch.is_empty() {
            debug!("Empty batch, nothing to commit");
            return Ok(0);
        }

        let now = chrono::Utc::now().naive_utc();
        // The batch path attributes the whole file to the current hour; it
        // does not back-fill historical buckets.
        let hour = truncate_to_hour(now);

        let txn = db
            .begin()
            .await
            .context("Failed to open aggregation transaction")?;

        StatsRepository::apply_bandwidth(&txn, hour, &batch.bandwidth)
            .await
            .context("Failed to apply bandwidth counters")?;

        let mut errors = 0u64;
        for (path, delta) in &batch.paths {
            if let Err(e) = StatsRepository::apply_cache_and_asset(&txn, path, delta, now).await {
                warn!("Skipping counters for {}: {}", path, e);
                errors += 1;
            }
        }

        txn.commit()
            .await
            .context("Failed to commit aggregation batch")?;

        Ok(errors)
    }
}
