use chrono::{NaiveDateTime, Timelike};
use std::collections::HashMap;

use super::classifier::{CacheOutcome, TrackableRequest};

/// Truncate a timestamp to its hour bucket (minute and second zeroed).
pub fn truncate_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Additive counters destined for one `bandwidth_buckets` row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandwidthDelta {
    pub requests: i64,
    pub bytes_sent: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub status_200: i64,
    pub status_206: i64,
    pub status_304: i64,
    pub status_404: i64,
    pub status_5xx: i64,
}

impl std::ops::AddAssign for BandwidthDelta {
    fn add_assign(&mut self, other: Self) {
        self.requests += other.requests;
        self.bytes_sent += other.bytes_sent;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
        self.status_200 += other.status_200;
        self.status_206 += other.status_206;
        self.status_304 += other.status_304;
        self.status_404 += other.status_404;
        self.status_5xx += other.status_5xx;
    }
}

impl BandwidthDelta {
    pub fn from_request(request: &TrackableRequest) -> Self {
        let mut delta = Self {
            requests: 1,
            bytes_sent: request.bytes_sent as i64,
            ..Self::default()
        };

        match request.outcome {
            Some(CacheOutcome::Hit) => delta.cache_hits = 1,
            Some(CacheOutcome::Miss) => delta.cache_misses = 1,
            None => {}
        }

        match request.status {
            200 => delta.status_200 = 1,
            206 => delta.status_206 = 1,
            304 => delta.status_304 = 1,
            404 => delta.status_404 = 1,
            s if s >= 500 => delta.status_5xx = 1,
            _ => {}
        }

        delta
    }

    /// Delta for a single event pushed through the live ingest API, which
    /// carries no HTTP status code.
    pub fn for_live_event(bytes_sent: i64, outcome: Option<CacheOutcome>) -> Self {
        Self {
            requests: 1,
            bytes_sent,
            cache_hits: matches!(outcome, Some(CacheOutcome::Hit)) as i64,
            cache_misses: matches!(outcome, Some(CacheOutcome::Miss)) as i64,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests == 0
    }
}

/// Additive counters destined for one `cache_entries` row (and the
/// `uploaded_assets` row sharing its path, when one exists).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheDelta {
    pub hits: i64,
    pub misses: i64,
    /// Events folded into this delta; each one counts as a download on the
    /// backing asset.
    pub events: i64,
    pub bytes_served: i64,
}

impl std::ops::AddAssign for CacheDelta {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.events += other.events;
        self.bytes_served += other.bytes_served;
    }
}

impl CacheDelta {
    pub fn for_event(outcome: Option<CacheOutcome>, bytes_served: i64) -> Self {
        Self {
            hits: matches!(outcome, Some(CacheOutcome::Hit)) as i64,
            misses: matches!(outcome, Some(CacheOutcome::Miss)) as i64,
            events: 1,
            bytes_served,
        }
    }
}

/// Everything one aggregation pass wants to commit, accumulated in memory
/// and applied in a single transaction. Threading this value through the
/// pass keeps the run restartable: nothing durable moves until commit.
#[derive(Debug, Default)]
pub struct AggregationBatch {
    pub bandwidth: BandwidthDelta,
    pub paths: HashMap<String, CacheDelta>,
}

impl AggregationBatch {
    pub fn record(&mut self, request: &TrackableRequest) {
        self.bandwidth += BandwidthDelta::from_request(request);

        // Only hit/miss verdicts reach the per-path cache counters; events
        // with an unrecognized cache status contribute to the hour bucket
        // alone.
        if request.outcome.is_some() {
            *self.paths.entry(request.path.clone()).or_default() +=
                CacheDelta::for_event(request.outcome, request.bytes_sent as i64);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bandwidth.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::classifier::CacheOutcome;

    fn request(path: &str, status: u16, bytes: u64, outcome: Option<CacheOutcome>) -> TrackableRequest {
        TrackableRequest {
            path: path.to_string(),
            status,
            bytes_sent: bytes,
            outcome,
        }
    }

    #[test]
    fn truncates_to_start_of_hour() {
        let ts = chrono::NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(14, 37, 59)
            .unwrap();
        let hour = truncate_to_hour(ts);
        assert_eq!(hour.hour(), 14);
        assert_eq!(hour.minute(), 0);
        assert_eq!(hour.second(), 0);
    }

    #[test]
    fn repeated_events_on_one_path_coalesce() {
        let mut batch = AggregationBatch::default();
        batch.record(&request("/media/a.jpg", 200, 500, Some(CacheOutcome::Hit)));
        batch.record(&request("/media/a.jpg", 200, 500, Some(CacheOutcome::Miss)));
        batch.record(&request("/media/b.png", 404, 0, Some(CacheOutcome::Miss)));

        assert_eq!(batch.paths.len(), 2);
        let a = &batch.paths["/media/a.jpg"];
        assert_eq!(a.hits, 1);
        assert_eq!(a.misses, 1);
        assert_eq!(a.events, 2);
        assert_eq!(a.bytes_served, 1000);

        assert_eq!(batch.bandwidth.requests, 3);
        assert_eq!(batch.bandwidth.bytes_sent, 1000);
        assert_eq!(batch.bandwidth.cache_hits, 1);
        assert_eq!(batch.bandwidth.cache_misses, 2);
        assert_eq!(batch.bandwidth.status_200, 2);
        assert_eq!(batch.bandwidth.status_404, 1);
    }

    #[test]
    fn unknown_outcome_touches_bandwidth_only() {
        let mut batch = AggregationBatch::default();
        batch.record(&request("/media/a.jpg", 200, 500, None));

        assert!(batch.paths.is_empty());
        assert_eq!(batch.bandwidth.requests, 1);
        assert_eq!(batch.bandwidth.cache_hits, 0);
        assert_eq!(batch.bandwidth.cache_misses, 0);
    }

    #[test]
    fn server_errors_share_one_bucket() {
        let mut batch = AggregationBatch::default();
        batch.record(&request("/media/a.jpg", 500, 0, Some(CacheOutcome::Miss)));
        batch.record(&request("/media/a.jpg", 502, 0, Some(CacheOutcome::Miss)));
        assert_eq!(batch.bandwidth.status_5xx, 2);
    }
}
