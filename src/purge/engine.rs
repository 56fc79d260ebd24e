use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::db::DatabaseConnection;
use crate::db::entities::{PurgeRecordModel, PurgeType};
use crate::db::repository::{NewPurgeRecord, PurgeRepository, PurgeRepositoryImpl};
use crate::error::Error;

/// What a purge invocation should evict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeScope {
    /// One CDN path, e.g. `/media/image.jpg`.
    Single(String),
    /// Everything under a storage bucket.
    Bucket(String),
    /// Free-text substring match against cached artifact paths.
    Pattern(String),
    /// The whole cache tree.
    Full,
}

impl PurgeScope {
    pub fn purge_type(&self) -> PurgeType {
        match self {
            PurgeScope::Single(_) => PurgeType::Single,
            PurgeScope::Bucket(_) => PurgeType::Bucket,
            PurgeScope::Pattern(_) => PurgeType::Pattern,
            PurgeScope::Full => PurgeType::Full,
        }
    }

    pub fn target(&self) -> String {
        match self {
            PurgeScope::Single(path) => path.clone(),
            PurgeScope::Bucket(bucket) => bucket.clone(),
            PurgeScope::Pattern(pattern) => pattern.clone(),
            PurgeScope::Full => "all".to_string(),
        }
    }

    /// Substring the on-disk sweep matches against. The match is
    /// deliberately coarse (no cache-key index); purge is operator-
    /// triggered and infrequent.
    fn substring(&self) -> Option<String> {
        match self {
            PurgeScope::Single(path) => Some(path.clone()),
            PurgeScope::Bucket(bucket) => Some(format!("/{}/", bucket)),
            PurgeScope::Pattern(pattern) => Some(pattern.clone()),
            PurgeScope::Full => None,
        }
    }
}

/// Result of one purge invocation. `success` is false when any individual
/// deletion failed; the counts then cover what was actually removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeOutcome {
    pub files_purged: i32,
    pub bytes_freed: i64,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct SweepResult {
    files_purged: i32,
    bytes_freed: i64,
    errors: Vec<String>,
}

/// Walks the on-disk cache tree, deletes matching artifacts, and keeps the
/// metadata store in sync: cached flags are flipped for everything in
/// scope and every invocation is recorded in the audit log.
pub struct PurgeService;

impl PurgeService {
    pub async fn purge_path(
        db: &DatabaseConnection,
        cache_root: &Path,
        path: &str,
        triggered_by: &str,
    ) -> Result<PurgeOutcome, Error> {
        Self::execute(
            db,
            cache_root,
            PurgeScope::Single(path.to_string()),
            triggered_by,
            None,
        )
        .await
    }

    pub async fn purge_bucket(
        db: &DatabaseConnection,
        cache_root: &Path,
        bucket: &str,
        triggered_by: &str,
    ) -> Result<PurgeOutcome, Error> {
        Self::execute(
            db,
            cache_root,
            PurgeScope::Bucket(bucket.to_string()),
            triggered_by,
            None,
        )
        .await
    }

    pub async fn purge_pattern(
        db: &DatabaseConnection,
        cache_root: &Path,
        pattern: &str,
        triggered_by: &str,
    ) -> Result<PurgeOutcome, Error> {
        Self::execute(
            db,
            cache_root,
            PurgeScope::Pattern(pattern.to_string()),
            triggered_by,
            None,
        )
        .await
    }

    /// Purge the entire cache tree. Destructive enough to demand an
    /// explicit confirmation flag from the caller.
    pub async fn purge_all(
        db: &DatabaseConnection,
        cache_root: &Path,
        confirm: bool,
        triggered_by: &str,
    ) -> Result<PurgeOutcome, Error> {
        if !confirm {
            return Err(Error::ConfirmationRequired);
        }
        Self::execute(
            db,
            cache_root,
            PurgeScope::Full,
            triggered_by,
            Some("Full cache purge".to_string()),
        )
        .await
    }

    pub async fn history(
        db: &DatabaseConnection,
        limit: u64,
    ) -> Result<Vec<PurgeRecordModel>, Error> {
        let repo = PurgeRepositoryImpl::new(db.clone());
        Ok(repo.history(limit).await?)
    }

    async fn execute(
        db: &DatabaseConnection,
        cache_root: &Path,
        scope: PurgeScope,
        triggered_by: &str,
        reason: Option<String>,
    ) -> Result<PurgeOutcome, Error> {
        let started_at = chrono::Utc::now().naive_utc();
        info!(
            "Starting {} purge of {:?} (target: {})",
            scope.purge_type(),
            cache_root,
            scope.target()
        );

        let sweep = sweep_cache_tree(cache_root, &scope);

        // Metadata reconciliation runs even after a partial sweep failure:
        // remaining artifacts will be re-cached on their next hit.
        let repo = PurgeRepositoryImpl::new(db.clone());
        let uncached = match &scope {
            PurgeScope::Single(path) => repo.mark_path_uncached(path).await?,
            PurgeScope::Bucket(bucket) => repo.mark_bucket_uncached(bucket).await?,
            PurgeScope::Pattern(pattern) => repo.mark_pattern_uncached(pattern).await?,
            PurgeScope::Full => repo.mark_all_uncached().await?,
        };
        debug!("Marked {} cache entries as uncached", uncached);

        let success = sweep.errors.is_empty();
        let error = if success {
            None
        } else {
            Some(sweep.errors.join("; "))
        };

        repo.record_purge(NewPurgeRecord {
            purge_type: scope.purge_type(),
            target: scope.target(),
            files_purged: sweep.files_purged,
            bytes_freed: sweep.bytes_freed,
            triggered_by: triggered_by.to_string(),
            reason,
            success,
            error_message: error.clone(),
            created_at: started_at,
            completed_at: chrono::Utc::now().naive_utc(),
        })
        .await?;

        info!(
            "Purge complete: {} files, {} bytes freed, success={}",
            sweep.files_purged, sweep.bytes_freed, success
        );

        Ok(PurgeOutcome {
            files_purged: sweep.files_purged,
            bytes_freed: sweep.bytes_freed,
            success,
            error,
        })
    }
}

/// Blocking filesystem sweep. Individual failures are collected, never
/// raised; the walk continues so a single unreadable entry cannot leave
/// the rest of the scope undeleted.
fn sweep_cache_tree(cache_root: &Path, scope: &PurgeScope) -> SweepResult {
    let mut result = SweepResult::default();

    if !cache_root.exists() {
        warn!("Cache root not found: {:?}", cache_root);
        return result;
    }

    match scope.substring() {
        None => sweep_full(cache_root, &mut result),
        Some(pattern) => sweep_matching(cache_root, &pattern, &mut result),
    }

    result
}

fn sweep_full(cache_root: &Path, result: &mut SweepResult) {
    let entries = match fs::read_dir(cache_root) {
        Ok(entries) => entries,
        Err(e) => {
            result.errors.push(format!("{:?}: {}", cache_root, e));
            return;
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                result.errors.push(format!("{:?}: {}", cache_root, e));
                continue;
            }
        };

        if path.is_dir() {
            let (files, bytes) = tree_stats(&path, result);
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    result.files_purged += files;
                    result.bytes_freed += bytes;
                }
                Err(e) => result.errors.push(format!("{:?}: {}", path, e)),
            }
        } else {
            remove_file(&path, result);
        }
    }
}

fn sweep_matching(dir: &Path, pattern: &str, result: &mut SweepResult) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            result.errors.push(format!("{:?}: {}", dir, e));
            return;
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                result.errors.push(format!("{:?}: {}", dir, e));
                continue;
            }
        };

        if path.is_dir() {
            sweep_matching(&path, pattern, result);
        } else if path.to_string_lossy().contains(pattern) {
            remove_file(&path, result);
        }
    }
}

/// Size is measured before removal so the audit row can report bytes freed.
fn remove_file(path: &Path, result: &mut SweepResult) {
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len() as i64,
        Err(e) => {
            result.errors.push(format!("{:?}: {}", path, e));
            return;
        }
    };

    match fs::remove_file(path) {
        Ok(()) => {
            result.files_purged += 1;
            result.bytes_freed += size;
        }
        Err(e) => result.errors.push(format!("{:?}: {}", path, e)),
    }
}

/// Recursively count files and bytes under a directory before its tree is
/// deleted in one call.
fn tree_stats(dir: &Path, result: &mut SweepResult) -> (i32, i64) {
    let mut files = 0i32;
    let mut bytes = 0i64;

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            result.errors.push(format!("{:?}: {}", dir, e));
            return (files, bytes);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let (f, b) = tree_stats(&path, result);
            files += f;
            bytes += b;
        } else if let Ok(metadata) = fs::metadata(&path) {
            files += 1;
            bytes += metadata.len() as i64;
        }
    }

    (files, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::StatsRepository;
    use crate::ingest::batch::CacheDelta;
    use crate::test_utils::TestDatabase;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, bytes: usize) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; bytes]).unwrap();
    }

    async fn seed_entry(db: &TestDatabase, path: &str) {
        let delta = CacheDelta {
            hits: 1,
            misses: 0,
            events: 1,
            bytes_served: 10,
        };
        StatsRepository::apply_cache_and_asset(
            db.connection().as_ref(),
            path,
            &delta,
            chrono::Utc::now().naive_utc(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn full_purge_of_empty_root_is_audited() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();

        let outcome = PurgeService::purge_all(&db.connection(), root.path(), true, "test")
            .await
            .unwrap();

        assert_eq!(outcome.files_purged, 0);
        assert_eq!(outcome.bytes_freed, 0);
        assert!(outcome.success);

        let history = PurgeService::history(&db.connection(), 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].purge_type, "full");
        assert_eq!(history[0].target, "all");
        assert!(history[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn full_purge_requires_confirmation() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();

        let result = PurgeService::purge_all(&db.connection(), root.path(), false, "test").await;
        assert!(matches!(result, Err(Error::ConfirmationRequired)));

        // refused purges are not audited
        let history = PurgeService::history(&db.connection(), 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn full_purge_empties_tree_and_counts_files() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();
        write_file(root.path(), "aa/media/photo.jpg", 100);
        write_file(root.path(), "aa/media/clip.mp4", 300);
        write_file(root.path(), "top-level.bin", 50);

        let outcome = PurgeService::purge_all(&db.connection(), root.path(), true, "test")
            .await
            .unwrap();

        assert_eq!(outcome.files_purged, 3);
        assert_eq!(outcome.bytes_freed, 450);
        assert!(fs::read_dir(root.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn bucket_purge_deletes_matches_and_reconciles_entries() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();
        // proxy cache trees key files by hash directories; the relative
        // path carries the original URL path
        write_file(root.path(), "media/photo.jpg", 100);
        write_file(root.path(), "media/clip.mp4", 200);
        write_file(root.path(), "static/app.ico", 30);

        seed_entry(&db, "/media/photo.jpg").await;
        seed_entry(&db, "/media/clip.mp4").await;
        seed_entry(&db, "/static/app.ico").await;

        let outcome = PurgeService::purge_bucket(&db.connection(), root.path(), "media", "test")
            .await
            .unwrap();

        assert_eq!(outcome.files_purged, 2);
        assert_eq!(outcome.bytes_freed, 300);
        assert!(root.path().join("static/app.ico").exists());

        let conn = db.connection();
        for (path, cached) in [
            ("/media/photo.jpg", false),
            ("/media/clip.mp4", false),
            ("/static/app.ico", true),
        ] {
            let entry = StatsRepository::find_cache_entry(conn.as_ref(), path)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(entry.is_cached, cached, "{}", path);
        }

        let history = PurgeService::history(&db.connection(), 10).await.unwrap();
        assert_eq!(history[0].purge_type, "bucket");
        assert_eq!(history[0].target, "media");
        assert_eq!(history[0].files_purged, 2);
    }

    #[tokio::test]
    async fn single_purge_matches_exact_path_substring() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();
        write_file(root.path(), "media/photo.jpg", 100);
        write_file(root.path(), "media/photo.jpg.thumb", 10);
        write_file(root.path(), "media/other.png", 20);

        seed_entry(&db, "/media/photo.jpg").await;

        let outcome =
            PurgeService::purge_path(&db.connection(), root.path(), "/media/photo.jpg", "test")
                .await
                .unwrap();

        // substring containment: the thumbnail variant matches too
        assert_eq!(outcome.files_purged, 2);
        assert!(root.path().join("media/other.png").exists());

        let entry = StatsRepository::find_cache_entry(db.connection().as_ref(), "/media/photo.jpg")
            .await
            .unwrap()
            .unwrap();
        assert!(!entry.is_cached);
        assert_eq!(entry.hit_count, 1, "purge keeps hit/miss history");
    }

    #[tokio::test]
    async fn missing_cache_root_yields_zero_counts_but_still_audits() {
        let db = TestDatabase::new().await.unwrap();

        let outcome = PurgeService::purge_bucket(
            &db.connection(),
            Path::new("/nonexistent/cache"),
            "media",
            "test",
        )
        .await
        .unwrap();

        assert_eq!(outcome.files_purged, 0);
        assert_eq!(outcome.bytes_freed, 0);
        assert!(outcome.success);

        let history = PurgeService::history(&db.connection(), 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn pattern_purge_is_substring_coarse() {
        let db = TestDatabase::new().await.unwrap();
        let root = TempDir::new().unwrap();
        write_file(root.path(), "media/photo-1.jpg", 10);
        write_file(root.path(), "media/photo-10.jpg", 10);
        write_file(root.path(), "media/other.png", 10);

        let outcome = PurgeService::purge_pattern(&db.connection(), root.path(), "photo-1", "test")
            .await
            .unwrap();

        // "photo-1" also matches "photo-10" — documented coarseness
        assert_eq!(outcome.files_purged, 2);
    }
}
