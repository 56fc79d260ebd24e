use super::parser::{AccessEvent, CacheStatus};

/// Extensions that mark a request as CDN asset traffic. Everything else
/// (API calls, health checks, directory hits) stays out of the counters.
pub const TRACKABLE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "mp4", "webm", "avi", "mov", "mkv", "flv",
    "m4v",
];

/// Hit/miss bucket a cache status falls into, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

pub fn cache_outcome(status: CacheStatus) -> Option<CacheOutcome> {
    match status {
        CacheStatus::Hit | CacheStatus::Stale => Some(CacheOutcome::Hit),
        CacheStatus::Miss | CacheStatus::Bypass | CacheStatus::Expired | CacheStatus::Updating => {
            Some(CacheOutcome::Miss)
        }
        CacheStatus::Unknown => None,
    }
}

/// An access event that survived classification and will be reduced into
/// the counter stores.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackableRequest {
    pub path: String,
    pub status: u16,
    pub bytes_sent: u64,
    pub outcome: Option<CacheOutcome>,
}

/// Decide whether an event is trackable CDN asset traffic.
///
/// The path must look like an asset under a bucket
/// (`/<bucket>/.../<name>.<ext>` with a recognized extension); everything
/// else is discarded silently.
pub fn classify(event: &AccessEvent) -> Option<TrackableRequest> {
    if !is_trackable_path(&event.path) {
        return None;
    }

    Some(TrackableRequest {
        path: event.path.clone(),
        status: event.status,
        bytes_sent: event.bytes_sent,
        outcome: cache_outcome(event.cache_status),
    })
}

fn is_trackable_path(path: &str) -> bool {
    // Query strings are not part of the cached object name
    let path = path.split('?').next().unwrap_or(path);

    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };

    // At least `<bucket>/<name>.<ext>`
    let mut segments = rest.split('/');
    let bucket = segments.next().unwrap_or("");
    let Some(name) = segments.last() else {
        return false;
    };
    if bucket.is_empty() || name.is_empty() {
        return false;
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            TRACKABLE_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::parse_line;

    fn event(path: &str, status: u16, cache_status: CacheStatus) -> AccessEvent {
        let line = format!(
            r#"198.51.100.7 - - [07/Aug/2026:09:15:00 +0000] "GET {} HTTP/1.1" {} 2048 "-" "test-agent" cache_status={}"#,
            path, status, cache_status
        );
        parse_line(&line).expect("test line should parse")
    }

    #[test]
    fn classifies_asset_request_preserving_fields() {
        let request = classify(&event("/media/photo.jpg", 200, CacheStatus::Hit)).unwrap();
        assert_eq!(request.path, "/media/photo.jpg");
        assert_eq!(request.status, 200);
        assert_eq!(request.bytes_sent, 2048);
        assert_eq!(request.outcome, Some(CacheOutcome::Hit));
    }

    #[test]
    fn drops_non_asset_paths() {
        assert!(classify(&event("/api/health", 200, CacheStatus::Hit)).is_none());
        assert!(classify(&event("/media/", 200, CacheStatus::Hit)).is_none());
        assert!(classify(&event("/favicon-no-bucket", 200, CacheStatus::Hit)).is_none());
        // extension only, no stem
        assert!(classify(&event("/media/.jpg", 200, CacheStatus::Hit)).is_none());
        // unlisted extension
        assert!(classify(&event("/media/report.pdf", 200, CacheStatus::Hit)).is_none());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(classify(&event("/media/PHOTO.JPG", 200, CacheStatus::Hit)).is_some());
        assert!(classify(&event("/videos/clip.MP4", 206, CacheStatus::Miss)).is_some());
    }

    #[test]
    fn nested_paths_and_query_strings_are_accepted() {
        assert!(classify(&event("/media/2026/08/photo.webp", 200, CacheStatus::Hit)).is_some());
        assert!(classify(&event("/media/photo.jpg?width=640", 200, CacheStatus::Hit)).is_some());
    }

    #[test]
    fn status_buckets_follow_the_cache_verdict() {
        assert_eq!(cache_outcome(CacheStatus::Hit), Some(CacheOutcome::Hit));
        assert_eq!(cache_outcome(CacheStatus::Stale), Some(CacheOutcome::Hit));
        assert_eq!(cache_outcome(CacheStatus::Miss), Some(CacheOutcome::Miss));
        assert_eq!(cache_outcome(CacheStatus::Bypass), Some(CacheOutcome::Miss));
        assert_eq!(cache_outcome(CacheStatus::Expired), Some(CacheOutcome::Miss));
        assert_eq!(cache_outcome(CacheStatus::Updating), Some(CacheOutcome::Miss));
        assert_eq!(cache_outcome(CacheStatus::Unknown), None);
    }

    #[test]
    fn unknown_status_stays_trackable_without_outcome() {
        let request = classify(&event("/media/photo.jpg", 200, CacheStatus::Unknown)).unwrap();
        assert_eq!(request.outcome, None);
    }
}
