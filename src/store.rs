//! The consolidated JSON store: one file holding every search and every unique job.
//!
//! All access to the backing file goes through [`ConsolidationStore`]. Writes
//! go through a temp file and a rename, and mutating calls hold `<store>.lock`
//! for their whole read-modify-write cycle.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, CorruptFilePolicy};
use crate::error::StoreError;
use crate::filters;
use crate::models::{
    now_timestamp, ConsolidatedStore, JobRecord, MergeInfo, MergePolicy, SearchParams,
    SearchRecord,
};

/// How the document used by a write was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Read from the existing file.
    Existing,
    /// No file yet; started empty.
    Created,
    /// The file was undecodable and has been discarded.
    Reset,
    /// The file was undecodable and has been moved to the given path.
    BackedUp(PathBuf),
}

/// What a call to [`ConsolidationStore::record_search`] did.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub jobs_found: usize,
    pub jobs_added: usize,
    /// Found jobs whose identifier was already stored (or repeated in the batch).
    pub duplicates: usize,
    /// Stored jobs overwritten with different content (last-write-wins only).
    pub jobs_updated: usize,
    pub total_searches: usize,
    pub total_jobs: usize,
    pub load_state: LoadState,
    /// The document as written.
    pub store: ConsolidatedStore,
}

/// What a call to [`ConsolidationStore::merge_file`] did.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub primary_searches: usize,
    pub primary_jobs: usize,
    pub secondary_searches: usize,
    pub secondary_jobs: usize,
    pub total_searches: usize,
    pub total_jobs: usize,
    pub duplicates: usize,
    pub secondary_removed: bool,
}

pub struct ConsolidationStore {
    path: PathBuf,
    config: Config,
}

impl ConsolidationStore {
    pub fn open(config: Config) -> Self {
        Self {
            path: config.store_path.clone(),
            config,
        }
    }

    /// Store at `path` with default settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::open(Config::with_store_path(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read-only load. A missing file is an empty store; a corrupt one is an error
    /// regardless of policy, since readers must not move files around.
    pub fn load(&self) -> Result<ConsolidatedStore, StoreError> {
        Ok(read_document(&self.path)?.unwrap_or_else(|| self.empty()))
    }

    /// Writes `store` after re-deriving its counters.
    pub fn save(&self, store: &mut ConsolidatedStore) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        store.recompute_totals();
        write_document(&self.path, store)
    }

    /// Creates an empty store file. Returns false if a file is already there.
    pub fn init(&self) -> Result<bool, StoreError> {
        let _lock = self.lock()?;
        if self.path.exists() {
            return Ok(false);
        }
        write_document(&self.path, &self.empty())?;
        info!(path = %self.path.display(), "Created empty store");
        Ok(true)
    }

    /// Appends one search to the history and merges its jobs by identifier.
    pub fn record_search(
        &self,
        new_jobs: Vec<JobRecord>,
        params: &SearchParams,
    ) -> Result<RecordOutcome, StoreError> {
        if let Some(index) = new_jobs.iter().position(|job| job.id.trim().is_empty()) {
            return Err(StoreError::MissingJobId { index });
        }

        let _lock = self.lock()?;
        let (mut doc, load_state) = self.load_for_update()?;

        let now = now_timestamp();
        let jobs_found = new_jobs.len();
        let nature = filters::job_nature(&params.filters.job_type);
        let new_jobs: Vec<JobRecord> = new_jobs
            .into_iter()
            .map(|mut job| {
                job.job_nature = nature.clone();
                job
            })
            .collect();

        doc.search_history
            .push(SearchRecord::from_params(params, jobs_found, now.clone()));
        let counts = doc.merge_jobs(new_jobs, self.config.merge_policy);
        doc.metadata.last_updated = now;
        doc.recompute_totals();

        write_document(&self.path, &doc)?;

        info!(
            keywords = %params.keywords,
            location = %params.location,
            found = jobs_found,
            added = counts.added,
            duplicates = counts.duplicates,
            total_jobs = doc.metadata.total_jobs,
            "Recorded search"
        );

        Ok(RecordOutcome {
            jobs_found,
            jobs_added: counts.added,
            duplicates: counts.duplicates,
            jobs_updated: counts.updated,
            total_searches: doc.metadata.total_searches,
            total_jobs: doc.metadata.total_jobs,
            load_state,
            store: doc,
        })
    }

    /// Merges another store file into this one (the other file's jobs win on
    /// collision), optionally deleting the other file afterwards.
    pub fn merge_file(
        &self,
        secondary: &Path,
        remove_secondary: bool,
    ) -> Result<MergeOutcome, StoreError> {
        if same_file(&self.path, secondary) {
            return Err(StoreError::SelfMerge {
                path: secondary.to_path_buf(),
            });
        }

        if !secondary.exists() {
            return Err(StoreError::io(
                secondary,
                io::Error::new(io::ErrorKind::NotFound, "store file not found"),
            ));
        }

        let _lock = self.lock()?;
        let secondary_lock = self.lock_at(secondary)?;
        let other = read_document(secondary)?.ok_or_else(|| {
            StoreError::io(
                secondary,
                io::Error::new(io::ErrorKind::NotFound, "store file not found"),
            )
        })?;
        let (primary, _) = self.load_for_update()?;

        let primary_searches = primary.search_history.len();
        let primary_jobs = primary.jobs.len();
        let secondary_searches = other.search_history.len();
        let secondary_jobs = other.jobs.len();

        let merged = merge_stores(primary, other);
        write_document(&self.path, &merged)?;

        let secondary_removed = if remove_secondary {
            remove_store_file(secondary)?;
            drop(secondary_lock);
            remove_empty_parent(secondary);
            true
        } else {
            false
        };

        let total_jobs = merged.metadata.total_jobs;
        let outcome = MergeOutcome {
            primary_searches,
            primary_jobs,
            secondary_searches,
            secondary_jobs,
            total_searches: merged.metadata.total_searches,
            total_jobs,
            duplicates: (primary_jobs + secondary_jobs).saturating_sub(total_jobs),
            secondary_removed,
        };

        info!(
            secondary = %secondary.display(),
            total_searches = outcome.total_searches,
            total_jobs = outcome.total_jobs,
            duplicates = outcome.duplicates,
            "Merged store files"
        );

        Ok(outcome)
    }

    fn empty(&self) -> ConsolidatedStore {
        ConsolidatedStore::new(&self.config.data_coverage, &self.config.export_version)
    }

    fn lock(&self) -> Result<Option<StoreLock>, StoreError> {
        self.lock_at(&self.path)
    }

    fn lock_at(&self, store_path: &Path) -> Result<Option<StoreLock>, StoreError> {
        if self.config.lock {
            StoreLock::acquire(store_path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn load_for_update(&self) -> Result<(ConsolidatedStore, LoadState), StoreError> {
        match read_document(&self.path) {
            Ok(Some(doc)) => {
                debug!(path = %self.path.display(), jobs = doc.jobs.len(), "Loaded existing store");
                Ok((doc, LoadState::Existing))
            }
            Ok(None) => Ok((self.empty(), LoadState::Created)),
            Err(StoreError::Corrupt { path, source }) => match self.config.corrupt_file_policy {
                CorruptFilePolicy::Fail => Err(StoreError::Corrupt { path, source }),
                CorruptFilePolicy::Reset => {
                    warn!(path = %path.display(), error = %source, "Discarding corrupt store file and starting fresh");
                    Ok((self.empty(), LoadState::Reset))
                }
                CorruptFilePolicy::Backup => {
                    let backup = backup_path(&path);
                    fs::rename(&path, &backup).map_err(|e| StoreError::io(&path, e))?;
                    warn!(
                        path = %path.display(),
                        backup = %backup.display(),
                        error = %source,
                        "Moved corrupt store file aside and starting fresh"
                    );
                    Ok((self.empty(), LoadState::BackedUp(backup)))
                }
            },
            Err(e) => Err(e),
        }
    }
}

/// Combines two stores: histories concatenated (primary first), jobs merged
/// with the secondary's version winning on identifier collision.
pub fn merge_stores(primary: ConsolidatedStore, secondary: ConsolidatedStore) -> ConsolidatedStore {
    let now = now_timestamp();
    let info = MergeInfo {
        merged_at: now.clone(),
        old_file_searches: primary.search_history.len(),
        old_file_jobs: primary.jobs.len(),
        new_file_searches: secondary.search_history.len(),
        new_file_jobs: secondary.jobs.len(),
    };

    let mut merged = primary;
    merged.search_history.extend(secondary.search_history);
    merged.merge_jobs(secondary.jobs, MergePolicy::LastWriteWins);
    merged.metadata.last_updated = now;
    merged.metadata.merge_info = Some(info);
    merged.recompute_totals();
    merged
}

/// Reads and normalizes a document. `Ok(None)` when the file does not exist.
pub fn read_document(path: &Path) -> Result<Option<ConsolidatedStore>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut doc: ConsolidatedStore =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    normalize(&mut doc, path);
    Ok(Some(doc))
}

fn normalize(doc: &mut ConsolidatedStore, path: &Path) {
    let before = doc.jobs.len();
    doc.jobs.retain(|job| !job.id.trim().is_empty());
    let unaddressable = before - doc.jobs.len();
    if unaddressable > 0 {
        warn!(path = %path.display(), count = unaddressable, "Dropped stored jobs without an identifier");
    }

    let mut seen = HashSet::new();
    let before = doc.jobs.len();
    doc.jobs.retain(|job| seen.insert(job.id.clone()));
    let collapsed = before - doc.jobs.len();
    if collapsed > 0 {
        warn!(path = %path.display(), count = collapsed, "Collapsed duplicate job identifiers, keeping first");
    }

    if doc.recompute_totals() {
        warn!(path = %path.display(), "Store counters did not match contents; recomputed");
    }
}

fn write_document(path: &Path, doc: &ConsolidatedStore) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(doc)?;
    let tmp = sibling(path, ".tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(path, e));
    }

    debug!(path = %path.display(), jobs = doc.jobs.len(), "Wrote store");
    Ok(())
}

fn remove_store_file(path: &Path) -> Result<(), StoreError> {
    fs::remove_file(path).map_err(|e| StoreError::io(path, e))?;
    info!(path = %path.display(), "Removed merged store file");
    Ok(())
}

/// Drops the containing directory if the merge left it empty.
fn remove_empty_parent(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let is_empty = fs::read_dir(parent)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            match fs::remove_dir(parent) {
                Ok(()) => info!(path = %parent.display(), "Removed empty directory"),
                Err(e) => debug!(path = %parent.display(), error = %e, "Could not remove directory"),
            }
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("store");
    let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%.3f");
    path.with_file_name(format!("{}.corrupt-{}.json", stem, stamp))
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive writer lock: `<store>.lock`, created with create-new semantics
/// and removed on drop.
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let path = sibling(store_path, ".lock");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                debug!(path = %path.display(), "Acquired store lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::Locked { path }),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release store lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterSet;
    use tempfile::TempDir;

    fn jobs(ids: &[&str]) -> Vec<JobRecord> {
        ids.iter()
            .map(|id| JobRecord::new(*id).with_title(format!("Job {}", id)))
            .collect()
    }

    fn params() -> SearchParams {
        SearchParams::new("Python Developer", "Paris", 10)
    }

    fn store_in(dir: &TempDir) -> ConsolidationStore {
        ConsolidationStore::at(dir.path().join("consolidated.json"))
    }

    fn store_with_config(dir: &TempDir, edit: impl FnOnce(&mut Config)) -> ConsolidationStore {
        let mut config = Config::with_store_path(dir.path().join("consolidated.json"));
        edit(&mut config);
        ConsolidationStore::open(config)
    }

    fn ids(store: &ConsolidatedStore) -> Vec<&str> {
        store.jobs.iter().map(|j| j.id.as_str()).collect()
    }

    #[test]
    fn test_record_search_into_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let params = params().with_filters(FilterSet {
            job_type: vec!["F".to_string()],
            ..Default::default()
        });

        let outcome = store.record_search(jobs(&["a", "b", "c"]), &params).unwrap();

        assert_eq!(outcome.load_state, LoadState::Created);
        assert_eq!(outcome.total_searches, 1);
        assert_eq!(outcome.total_jobs, 3);
        let saved = store.load().unwrap();
        assert_eq!(saved.metadata.total_searches, 1);
        assert_eq!(saved.metadata.total_jobs, 3);
        assert_eq!(saved.search_history.len(), 1);
        assert_eq!(
            saved.search_history[0].search_filters.job_types.description,
            Some(vec!["Full-time".to_string()])
        );
        assert!(saved.jobs.iter().all(|j| j.job_nature == "Full-time"));
        assert_eq!(saved.metadata.export_version, "incremental_v8.0");
    }

    #[test]
    fn test_record_search_reports_duplicates() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.record_search(jobs(&["a", "b"]), &params()).unwrap();

        let outcome = store.record_search(jobs(&["b", "c"]), &params()).unwrap();

        assert_eq!(outcome.load_state, LoadState::Existing);
        assert_eq!(outcome.jobs_found, 2);
        assert_eq!(outcome.jobs_added, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.total_jobs, 3);
        assert_eq!(ids(&store.load().unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_counters_match_contents_after_every_call() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let batches: Vec<Vec<JobRecord>> = vec![
            jobs(&["a"]),
            jobs(&[]),
            jobs(&["a", "b", "b"]),
            jobs(&["c", "d"]),
            jobs(&[]),
        ];

        for (n, batch) in batches.into_iter().enumerate() {
            let outcome = store.record_search(batch, &params()).unwrap();
            let saved = store.load().unwrap();
            assert_eq!(saved.search_history.len(), n + 1);
            assert_eq!(saved.metadata.total_searches, saved.search_history.len());
            assert_eq!(saved.metadata.total_jobs, saved.jobs.len());
            assert_eq!(outcome.total_jobs, saved.jobs.len());
        }
        assert_eq!(store.load().unwrap().metadata.total_jobs, 4);
    }

    #[test]
    fn test_same_job_twice_does_not_grow_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let first = store.record_search(jobs(&["a"]), &params()).unwrap();
        let second = store.record_search(jobs(&["a"]), &params()).unwrap();

        assert_eq!(first.total_jobs, 1);
        assert_eq!(second.total_jobs, 1);
        assert_eq!(second.jobs_added, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.total_searches, 2);
    }

    #[test]
    fn test_missing_id_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut batch = jobs(&["a"]);
        batch.push(JobRecord::new("  "));

        let err = store.record_search(batch, &params()).unwrap_err();

        assert!(matches!(err, StoreError::MissingJobId { index: 1 }));
        assert!(!store.exists());
    }

    #[test]
    fn test_first_write_wins_keeps_original_record() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .record_search(vec![JobRecord::new("a").with_title("Original")], &params())
            .unwrap();

        let outcome = store
            .record_search(vec![JobRecord::new("a").with_title("Changed")], &params())
            .unwrap();

        assert_eq!(outcome.jobs_updated, 0);
        assert_eq!(store.load().unwrap().get_job("a").unwrap().title, "Original");
    }

    #[test]
    fn test_last_write_wins_replaces_record() {
        let dir = TempDir::new().unwrap();
        let store = store_with_config(&dir, |c| c.merge_policy = MergePolicy::LastWriteWins);
        store
            .record_search(vec![JobRecord::new("a").with_title("Original")], &params())
            .unwrap();

        let outcome = store
            .record_search(vec![JobRecord::new("a").with_title("Changed")], &params())
            .unwrap();

        assert_eq!(outcome.jobs_updated, 1);
        assert_eq!(outcome.total_jobs, 1);
        assert_eq!(store.load().unwrap().get_job("a").unwrap().title, "Changed");
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let outcome = store
            .record_search(
                vec![JobRecord::new("a").with_company("Société Générale")],
                &params().with_filters(FilterSet {
                    experience: vec!["2".into(), "9".into()],
                    listed_at: Some(604_800),
                    distance: Some(25),
                    ..Default::default()
                }),
            )
            .unwrap();

        let mut doc = outcome.store;
        doc.jobs[0]
            .extra
            .insert("raw".to_string(), serde_json::json!({"nested": [1, 2, 3]}));
        store.save(&mut doc).unwrap();

        assert_eq!(store.load().unwrap(), doc);
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("Société Générale"));
        assert!(text.contains("\n  \"metadata\""));
    }

    #[test]
    fn test_corrupt_file_backup_policy_preserves_bytes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{ not json").unwrap();

        let outcome = store.record_search(jobs(&["a", "b"]), &params()).unwrap();

        assert_eq!(outcome.total_searches, 1);
        assert_eq!(outcome.total_jobs, 2);
        match &outcome.load_state {
            LoadState::BackedUp(backup) => {
                assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
            }
            other => panic!("unexpected load state: {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_file_reset_policy_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = store_with_config(&dir, |c| c.corrupt_file_policy = CorruptFilePolicy::Reset);
        fs::write(store.path(), "garbage").unwrap();

        let outcome = store.record_search(jobs(&["a", "b"]), &params()).unwrap();

        assert_eq!(outcome.load_state, LoadState::Reset);
        assert_eq!(outcome.total_searches, 1);
        assert_eq!(outcome.total_jobs, 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_file_fail_policy_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let store = store_with_config(&dir, |c| c.corrupt_file_policy = CorruptFilePolicy::Fail);
        fs::write(store.path(), "garbage").unwrap();

        let err = store.record_search(jobs(&["a"]), &params()).unwrap_err();

        assert!(err.is_corrupt());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "garbage");
        assert!(!sibling(store.path(), ".lock").exists());
    }

    #[test]
    fn test_corrupt_error_keeps_decode_source() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<serde_json::Error>().is_some());
    }

    #[test]
    fn test_null_fields_in_stored_jobs_keep_history() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let raw = serde_json::json!({
            "metadata": {
                "creation_date": "2025-06-01T10:00:00",
                "last_updated": "2025-06-01T10:00:00",
                "total_searches": 1,
                "total_jobs": 2,
                "data_coverage": null,
                "export_version": "incremental_v8.0"
            },
            "search_history": [
                {"keywords": "SEO", "location": null, "limit_requested": 10, "jobs_found": 2,
                 "search_timestamp": "2025-06-01T10:00:00"}
            ],
            "jobs": [
                {"id": "a", "title": "SEO Manager", "work_remote_allowed": null, "job_state": null},
                {"id": "b", "company": null, "listed_at": null}
            ]
        });
        fs::write(store.path(), raw.to_string()).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(ids(&doc), vec!["a", "b"]);
        assert_eq!(doc.get_job("a").unwrap().job_state, "");

        let outcome = store.record_search(jobs(&["c"]), &params()).unwrap();

        assert_eq!(outcome.load_state, LoadState::Existing);
        assert_eq!(outcome.total_searches, 2);
        assert_eq!(outcome.total_jobs, 3);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_top_level_key_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), r#"{"metadata": {}, "jobs": []}"#).unwrap();

        assert!(store.load().unwrap_err().is_corrupt());
    }

    #[test]
    fn test_load_repairs_counters_and_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let raw = serde_json::json!({
            "metadata": {
                "creation_date": "2025-06-01T10:00:00",
                "last_updated": "2025-06-01T10:00:00",
                "total_searches": 5,
                "total_jobs": 9,
                "data_coverage": "Minimal - No duplicate fields",
                "export_version": "incremental_v8.0"
            },
            "search_history": [],
            "jobs": [
                {"id": "a", "title": "first"},
                {"id": "a", "title": "second"},
                {"id": "", "title": "orphan"},
                {"id": "b"}
            ]
        });
        fs::write(store.path(), raw.to_string()).unwrap();

        let doc = store.load().unwrap();

        assert_eq!(ids(&doc), vec!["a", "b"]);
        assert_eq!(doc.get_job("a").unwrap().title, "first");
        assert_eq!(doc.metadata.total_jobs, 2);
        assert_eq!(doc.metadata.total_searches, 0);
    }

    #[test]
    fn test_empty_store_loads_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let doc = store_in(&dir).load().unwrap();
        assert!(doc.search_history.is_empty());
        assert!(doc.jobs.is_empty());
    }

    #[test]
    fn test_creates_containing_directory() {
        let dir = TempDir::new().unwrap();
        let store = ConsolidationStore::at(dir.path().join("exports/Exports/consolidated.json"));

        store.record_search(jobs(&["a"]), &params()).unwrap();

        assert!(store.exists());
        assert!(!sibling(store.path(), ".lock").exists());
        assert!(!sibling(store.path(), ".tmp").exists());
    }

    #[test]
    fn test_init_only_creates_once() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.init().unwrap());
        assert!(!store.init().unwrap());
        assert_eq!(store.load().unwrap().metadata.total_jobs, 0);
    }

    #[test]
    fn test_held_lock_blocks_writers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let lock = StoreLock::acquire(store.path()).unwrap();

        let err = store.record_search(jobs(&["a"]), &params()).unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));

        drop(lock);
        assert!(store.record_search(jobs(&["a"]), &params()).is_ok());
    }

    #[test]
    fn test_lock_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let store = store_with_config(&dir, |c| c.lock = false);
        let _lock = StoreLock::acquire(store.path()).unwrap();

        assert!(store.record_search(jobs(&["a"]), &params()).is_ok());
    }

    fn doc_with(ids: &[&str], searches: usize, label: &str) -> ConsolidatedStore {
        let mut doc = ConsolidatedStore::new("coverage", "v");
        doc.jobs = ids
            .iter()
            .map(|id| JobRecord::new(*id).with_title(format!("{} {}", label, id)))
            .collect();
        doc.search_history = (0..searches)
            .map(|n| SearchRecord::from_params(&SearchParams::new(format!("{} {}", label, n), "", 5), 1, now_timestamp()))
            .collect();
        doc.recompute_totals();
        doc
    }

    #[test]
    fn test_merge_stores_disjoint_sums_jobs() {
        let a = doc_with(&["1", "2"], 2, "A");
        let b = doc_with(&["3", "4", "5"], 1, "B");
        let creation = a.metadata.creation_date.clone();

        let merged = merge_stores(a, b);

        assert_eq!(merged.metadata.total_jobs, 5);
        assert_eq!(merged.metadata.total_searches, 3);
        assert_eq!(merged.search_history[0].keywords, "A 0");
        assert_eq!(merged.search_history[2].keywords, "B 0");
        assert_eq!(merged.metadata.creation_date, creation);
        let info = merged.metadata.merge_info.unwrap();
        assert_eq!((info.old_file_jobs, info.new_file_jobs), (2, 3));
        assert_eq!((info.old_file_searches, info.new_file_searches), (2, 1));
    }

    #[test]
    fn test_merge_stores_identical_ids_takes_secondary_version() {
        let a = doc_with(&["1", "2"], 1, "A");
        let b = doc_with(&["2", "1"], 1, "B");
        let expected = b.jobs.clone();

        let merged = merge_stores(a, b);

        assert_eq!(merged.metadata.total_jobs, 2);
        for job in &expected {
            assert_eq!(merged.get_job(&job.id), Some(job));
        }
    }

    #[test]
    fn test_merge_file_removes_secondary_and_empty_directory() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.record_search(jobs(&["a", "b"]), &params()).unwrap();

        let other = ConsolidationStore::at(dir.path().join("Exports/consolidated.json"));
        other.record_search(jobs(&["b", "c"]), &params()).unwrap();

        let outcome = store.merge_file(other.path(), true).unwrap();

        assert_eq!(outcome.primary_jobs, 2);
        assert_eq!(outcome.secondary_jobs, 2);
        assert_eq!(outcome.total_jobs, 3);
        assert_eq!(outcome.total_searches, 2);
        assert_eq!(outcome.duplicates, 1);
        assert!(outcome.secondary_removed);
        assert!(!other.exists());
        assert!(!dir.path().join("Exports").exists());
        assert!(store.load().unwrap().metadata.merge_info.is_some());
    }

    #[test]
    fn test_merge_file_keeps_secondary_when_asked() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let other = ConsolidationStore::at(dir.path().join("other.json"));
        other.record_search(jobs(&["x"]), &params()).unwrap();

        let outcome = store.merge_file(other.path(), false).unwrap();

        assert_eq!(outcome.total_jobs, 1);
        assert!(!outcome.secondary_removed);
        assert!(other.exists());
    }

    #[test]
    fn test_merge_file_rejects_missing_or_corrupt_secondary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let missing = store.merge_file(&dir.path().join("nope.json"), true).unwrap_err();
        assert!(matches!(missing, StoreError::Io { .. }));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "[]").unwrap();
        assert!(store.merge_file(&bad, true).unwrap_err().is_corrupt());
        assert!(bad.exists());
    }

    #[test]
    fn test_merge_file_waits_for_secondary_writer() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.record_search(jobs(&["a"]), &params()).unwrap();
        let other = ConsolidationStore::at(dir.path().join("other.json"));
        other.record_search(jobs(&["b"]), &params()).unwrap();
        let held = StoreLock::acquire(other.path()).unwrap();

        let err = store.merge_file(other.path(), true).unwrap_err();

        assert!(matches!(err, StoreError::Locked { .. }));
        assert!(other.exists());
        assert_eq!(store.load().unwrap().metadata.total_jobs, 1);
        assert!(!sibling(store.path(), ".lock").exists());

        drop(held);
        let outcome = store.merge_file(other.path(), true).unwrap();
        assert_eq!(outcome.total_jobs, 2);
        assert!(!other.exists());
        assert!(!sibling(other.path(), ".lock").exists());
    }

    #[test]
    fn test_merge_file_into_itself_is_refused() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.record_search(jobs(&["a"]), &params()).unwrap();

        let err = store.merge_file(store.path(), true).unwrap_err();

        assert!(matches!(err, StoreError::SelfMerge { .. }));
        assert!(store.exists());
    }
}
