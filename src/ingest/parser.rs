use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Upstream cache layer's verdict for one request.
///
/// Closed set with an explicit fallback so a typo in the log trailer can
/// never create a new counter bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
    Bypass,
    Expired,
    Updating,
    Unknown,
}

impl CacheStatus {
    /// Parse a log token. Unrecognized tokens map to `Unknown` rather than
    /// failing the line.
    pub fn from_token(token: &str) -> Self {
        match token {
            "HIT" => CacheStatus::Hit,
            "STALE" => CacheStatus::Stale,
            "MISS" => CacheStatus::Miss,
            "BYPASS" => CacheStatus::Bypass,
            "EXPIRED" => CacheStatus::Expired,
            "UPDATING" => CacheStatus::Updating,
            _ => CacheStatus::Unknown,
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "HIT"),
            CacheStatus::Stale => write!(f, "STALE"),
            CacheStatus::Miss => write!(f, "MISS"),
            CacheStatus::Bypass => write!(f, "BYPASS"),
            CacheStatus::Expired => write!(f, "EXPIRED"),
            CacheStatus::Updating => write!(f, "UPDATING"),
            CacheStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One structured access-log record.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessEvent {
    pub client: String,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub bytes_sent: u64,
    pub referer: String,
    pub user_agent: String,
    pub cache_status: CacheStatus,
}

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Parse one access-log line:
///
/// ```text
/// <ip> - <user> [<ts>] "<METHOD> <path> <proto>" <status> <bytes> "<referer>" "<ua>" cache_status=<TOKEN>
/// ```
///
/// Quote-splitting is enough to take the record apart; anything that does
/// not fit (truncated lines, rotation artifacts, foreign formats mixed into
/// the file) yields `None` and is counted by the caller, never raised.
pub fn parse_line(line: &str) -> Option<AccessEvent> {
    let fields = line.split('"').collect::<Vec<_>>();
    if fields.len() != 7 {
        return None;
    }

    // "<ip> - <user> [<ts>] "
    let prefix = fields[0];
    let mut head = prefix.split_whitespace();
    let client = head.next()?.to_string();
    if head.next()? != "-" {
        return None;
    }
    head.next()?; // remote user, unused

    let ts_start = prefix.find('[')?;
    let ts_end = prefix.find(']')?;
    let timestamp =
        DateTime::parse_from_str(prefix.get(ts_start + 1..ts_end)?, TIMESTAMP_FORMAT).ok()?;

    // "<METHOD> <path> <proto>"
    let request = fields[1].split_whitespace().collect::<Vec<_>>();
    if request.len() != 3 {
        return None;
    }
    let method = request[0].to_string();
    let path = request[1].to_string();

    // " <status> <bytes> "
    let numbers = fields[2].split_whitespace().collect::<Vec<_>>();
    if numbers.len() != 2 {
        return None;
    }
    let status = numbers[0].parse::<u16>().ok()?;
    let bytes_sent = numbers[1].parse::<u64>().ok()?;

    let referer = fields[3].to_string();
    let user_agent = fields[5].to_string();

    // Trailer after the user-agent quote; absent on foreign log formats.
    let cache_status = fields[6]
        .split_whitespace()
        .find_map(|token| token.strip_prefix("cache_status="))
        .map(CacheStatus::from_token)
        .unwrap_or(CacheStatus::Unknown);

    Some(AccessEvent {
        client,
        timestamp,
        method,
        path,
        status,
        bytes_sent,
        referer,
        user_agent,
        cache_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"203.0.113.9 - - [07/Aug/2026:14:03:21 +0000] "GET /media/photo.jpg HTTP/1.1" 200 51234 "https://example.com/" "Mozilla/5.0" cache_status=HIT"#;

    #[test]
    fn parses_well_formed_line() {
        let event = parse_line(LINE).expect("line should parse");
        assert_eq!(event.client, "203.0.113.9");
        assert_eq!(event.method, "GET");
        assert_eq!(event.path, "/media/photo.jpg");
        assert_eq!(event.status, 200);
        assert_eq!(event.bytes_sent, 51234);
        assert_eq!(event.referer, "https://example.com/");
        assert_eq!(event.user_agent, "Mozilla/5.0");
        assert_eq!(event.cache_status, CacheStatus::Hit);
        assert_eq!(event.timestamp.format("%H:%M:%S").to_string(), "14:03:21");
    }

    #[test]
    fn missing_trailer_maps_to_unknown() {
        let line = r#"10.0.0.1 - - [07/Aug/2026:14:03:21 +0000] "GET /media/clip.mp4 HTTP/1.1" 206 1024 "-" "curl/8.0" "#;
        let event = parse_line(line).expect("line should parse");
        assert_eq!(event.cache_status, CacheStatus::Unknown);
    }

    #[test]
    fn unrecognized_token_maps_to_unknown() {
        let line = LINE.replace("cache_status=HIT", "cache_status=REVALIDTED");
        let event = parse_line(&line).expect("line should parse");
        assert_eq!(event.cache_status, CacheStatus::Unknown);
    }

    #[test]
    fn rejects_truncated_line() {
        assert!(parse_line(r#"203.0.113.9 - - [07/Aug/2026:14:03:21 +0000] "GET /me"#).is_none());
    }

    #[test]
    fn rejects_non_numeric_status_and_bytes() {
        assert!(parse_line(&LINE.replace(" 200 ", " OK ")).is_none());
        assert!(parse_line(&LINE.replace(" 51234 ", " -51234 ")).is_none());
    }

    #[test]
    fn rejects_foreign_format() {
        assert!(parse_line("Aug  7 14:03:21 host systemd[1]: Started session").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn rejects_bad_timestamp() {
        let line = LINE.replace("07/Aug/2026:14:03:21 +0000", "not-a-date");
        assert!(parse_line(&line).is_none());
    }
}
