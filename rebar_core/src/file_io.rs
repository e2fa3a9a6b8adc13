//! # File I/O Module
//!
//! Project and report files with safety features:
//! - **Atomic saves**: write to a `.tmp` sibling, fsync, rename over the target
//! - **File locking**: keep two runs from writing the same project on a shared drive
//! - **Version validation**: refuse project files newer than this schema
//!
//! ## File Format
//!
//! Projects are `.rbp` files containing JSON. Reports are plain `.json`.
//! Lock files sit next to the project as `.rbp.lock` and record who holds
//! the lock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rebar_core::file_io::{load_project, save_project, FileLock};
//! use rebar_core::project::Project;
//! use std::path::Path;
//!
//! let path = Path::new("foundation.rbp");
//! let lock = FileLock::acquire(path, "engineer@company.com").unwrap();
//! save_project(&Project::sample(), path).unwrap();
//! drop(lock);
//!
//! let project = load_project(path).unwrap();
//! assert_eq!(project.strips.len(), 2);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{LayoutError, LayoutResult};
use crate::project::{Project, SCHEMA_VERSION};
use crate::report::LayoutReport;

/// Project file extension
pub const PROJECT_EXTENSION: &str = "rbp";

/// Locks older than this are taken over
const STALE_LOCK_HOURS: i64 = 24;

// ============================================================================
// Locking
// ============================================================================

/// Lock file metadata stored in `.rbp.lock` files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// User identifier (email or username)
    pub user_id: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    /// Whether the holder is gone: same machine with a dead pid, or too old.
    fn is_stale(&self) -> bool {
        if (Utc::now() - self.locked_at).num_hours() > STALE_LOCK_HOURS {
            return true;
        }
        hostname().is_some_and(|machine| machine == self.machine) && !process_alive(self.pid)
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME").ok().or_else(|| std::env::var("HOST").ok())
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Exclusive lock on a project file, released on drop.
///
/// Holds an OS lock (fs2) on the lock file and writes [`LockInfo`] into it
/// so other users can see who has the project open.
pub struct FileLock {
    project_path: PathBuf,
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl FileLock {
    /// Acquire the lock, taking over a stale one.
    ///
    /// Fails with [`LayoutError::FileLocked`] while another live process
    /// holds it.
    pub fn acquire(path: &Path, user_id: impl Into<String>) -> LayoutResult<Self> {
        let lock_path = lock_path_for(path);
        if let Some(existing) = read_lock_info(&lock_path).filter(|info| !info.is_stale()) {
            return Err(LayoutError::file_locked(
                path.display().to_string(),
                format!("{} ({})", existing.user_id, existing.machine),
                existing.locked_at.to_rfc3339(),
            ));
        }

        let info = LockInfo::new(user_id);
        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| LayoutError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| LayoutError::file_locked(path.display().to_string(), "another process", "unknown"))?;

        let json = serde_json::to_string_pretty(&info)?;
        lock_file
            .write_all(json.as_bytes())
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| LayoutError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;

        tracing::debug!(path = %path.display(), user = %info.user_id, "project locked");
        Ok(FileLock { project_path: path.to_path_buf(), lock_path, _lock_file: lock_file, info })
    }

    /// Current holder of a live lock, if any.
    pub fn check(path: &Path) -> Option<LockInfo> {
        read_lock_info(&lock_path_for(path)).filter(|info| !info.is_stale())
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(project_path: &Path) -> PathBuf {
    let mut lock_path = project_path.to_path_buf();
    let extension = lock_path
        .extension()
        .map(|e| format!("{}.lock", e.to_string_lossy()))
        .unwrap_or_else(|| "lock".to_string());
    lock_path.set_extension(extension);
    lock_path
}

fn read_lock_info(lock_path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&contents).ok()
}

// ============================================================================
// Atomic JSON files
// ============================================================================

/// Write `value` as pretty JSON next to `path`, fsync, then rename over it.
fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> LayoutResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = tmp_path_for(path);

    let mut tmp_file = File::create(&tmp_path)
        .map_err(|e| LayoutError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;
    tmp_file
        .write_all(json.as_bytes())
        .and_then(|_| tmp_file.sync_all())
        .map_err(|e| LayoutError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        LayoutError::file_error("rename to final", path.display().to_string(), e.to_string())
    })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp_path = path.to_path_buf();
    let extension = path
        .extension()
        .map(|e| format!("{}.tmp", e.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    tmp_path.set_extension(extension);
    tmp_path
}

fn read_json<T: DeserializeOwned>(path: &Path) -> LayoutResult<T> {
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut contents))
        .map_err(|e| LayoutError::file_error("read", path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| LayoutError::SerializationError {
        reason: format!("Invalid JSON in {}: {}", path.display(), e),
    })
}

// ============================================================================
// Projects and reports
// ============================================================================

/// Save a project atomically.
pub fn save_project(project: &Project, path: &Path) -> LayoutResult<()> {
    write_json_atomic(project, path)?;
    tracing::debug!(path = %path.display(), strips = project.strips.len(), "project saved");
    Ok(())
}

/// Load a project and check its schema version.
pub fn load_project(path: &Path) -> LayoutResult<Project> {
    let project: Project = read_json(path)?;
    validate_version(&project.meta.version)?;
    Ok(project)
}

/// Load a project along with the holder of its lock, if any.
pub fn load_project_with_lock_check(path: &Path) -> LayoutResult<(Project, Option<LockInfo>)> {
    let project = load_project(path)?;
    Ok((project, FileLock::check(path)))
}

/// Save a run report atomically.
pub fn save_report(report: &LayoutReport, path: &Path) -> LayoutResult<()> {
    write_json_atomic(report, path)?;
    tracing::debug!(path = %path.display(), run_id = %report.run_id, "report saved");
    Ok(())
}

pub fn load_report(path: &Path) -> LayoutResult<LayoutReport> {
    read_json(path)
}

/// Same major version, and for 0.x no newer minor than this build.
fn validate_version(file_version: &str) -> LayoutResult<()> {
    let parse = |v: &str| v.split('.').filter_map(|p| p.parse::<u32>().ok()).collect::<Vec<_>>();
    let file = parse(file_version);
    let current = parse(SCHEMA_VERSION);
    let mismatch = || LayoutError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    let (Some(&file_major), Some(&current_major)) = (file.first(), current.first()) else {
        return Err(mismatch());
    };
    if file_major != current_major {
        return Err(mismatch());
    }
    if current_major == 0 {
        if let (Some(&file_minor), Some(&current_minor)) = (file.get(1), current.get(1)) {
            if file_minor > current_minor {
                return Err(mismatch());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Foundation;
    use tempfile::tempdir;

    #[test]
    fn test_lock_path_generation() {
        let lock_path = lock_path_for(Path::new("/path/to/project.rbp"));
        assert_eq!(lock_path, Path::new("/path/to/project.rbp.lock"));
        assert_eq!(tmp_path_for(Path::new("/path/to/report.json")), Path::new("/path/to/report.json.tmp"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.rbp");

        let project = Project::sample();
        save_project(&project, &path).unwrap();

        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.meta.id, project.meta.id);
        assert_eq!(loaded.strips, project.strips);
        assert_eq!(loaded.config, project.config);
    }

    #[test]
    fn test_atomic_save_leaves_no_tmp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("atomic.rbp");
        save_project(&Project::sample(), &path).unwrap();
        assert!(path.exists());
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_project(&dir.path().join("missing.rbp")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_ERROR");
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.rbp");
        fs::write(&path, "{ not json").unwrap();
        let err = load_project(&path).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_newer_schema_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("newer.rbp");
        let mut project = Project::sample();
        project.meta.version = "0.9.0".to_string();
        save_project(&project, &path).unwrap();
        assert_eq!(load_project(&path).unwrap_err().error_code(), "VERSION_MISMATCH");
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version(SCHEMA_VERSION).is_ok());
        assert!(validate_version("0.1.5").is_ok());
        assert!(validate_version("1.0.0").is_err());
        assert!(validate_version("0.2.0").is_err());
        assert!(validate_version("garbage").is_err());
    }

    #[test]
    fn test_file_lock_acquire_and_release() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.rbp");
        File::create(&path).unwrap();

        let lock = FileLock::acquire(&path, "test@example.com").unwrap();
        assert_eq!(lock.info.user_id, "test@example.com");
        assert_eq!(lock.project_path(), path.as_path());
        let lock_path = lock_path_for(&path);
        assert!(lock_path.exists());

        drop(lock);
        assert!(!lock_path.exists());
        assert!(FileLock::check(&path).is_none());
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stale.rbp");
        let mut old = LockInfo::new("someone@else.com");
        old.locked_at = Utc::now() - chrono::Duration::hours(STALE_LOCK_HOURS + 1);
        fs::write(lock_path_for(&path), serde_json::to_string(&old).unwrap()).unwrap();

        assert!(FileLock::check(&path).is_none());
        let lock = FileLock::acquire(&path, "me@example.com").unwrap();
        assert_eq!(lock.info.user_id, "me@example.com");
    }

    #[test]
    fn test_load_with_lock_check() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("check.rbp");
        save_project(&Project::sample(), &path).unwrap();
        let (loaded, lock_info) = load_project_with_lock_check(&path).unwrap();
        assert_eq!(loaded.strips.len(), 2);
        assert!(lock_info.is_none());
    }

    #[test]
    fn test_report_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        let project = Project::sample();
        let mut foundation = Foundation::new(&project.strips, &project.config).unwrap();
        foundation.run().unwrap();
        let report = LayoutReport::new(&project.meta, &foundation).unwrap();

        save_report(&report, &path).unwrap();
        let loaded = load_report(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.strips.len(), 2);
        let (a, b) = (loaded.quantities.unwrap(), report.quantities.unwrap());
        assert!((a.total - b.total).abs() < 1e-9);
    }
}
