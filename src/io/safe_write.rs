use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::{Builder, NamedTempFile};

/// Suffix of staging files left next to the target by an interrupted save
const TMP_SUFFIX: &str = ".tmp";

/// Error type for the durable write protocol. Each variant names the
/// step that failed, so callers can tell "disk untouched" apart from
/// "manual attention required".
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Staging the temp file failed; the target is untouched
    #[error("could not stage temp file for {path}: {source}")]
    Stage {
        path: PathBuf,
        source: io::Error,
    },
    /// Snapshotting the previous generation failed; the target is
    /// untouched
    #[error("could not snapshot backup {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: io::Error,
    },
    /// The commit rename (or a sync after it) failed. The backup may be
    /// the only safe copy.
    #[error("could not commit {path}, check the backup at {backup}: {source}")]
    Commit {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },
}

/// The single retained backup generation lives at `target + ".bak"`
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Durably write `bytes` to `target`: stage to a temp file in the same
/// directory and fsync it, snapshot the previous generation to `.bak` and
/// fsync that, atomically rename the temp onto the target, fsync the
/// target, then best-effort fsync the containing directory.
///
/// The target file is never modified before the rename. Not reentrant
/// against a second writer of the same target; callers serialize saves
/// per target path.
pub fn write_durable(target: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let staged = stage(target, bytes)?;
    snapshot(target)?;
    commit(staged, target)
}

/// Stage `bytes` into a fresh temp file next to `target` and force it to
/// stable storage. The name carries a millisecond timestamp; tempfile
/// adds the random suffix.
pub(crate) fn stage(target: &Path, bytes: &[u8]) -> Result<NamedTempFile, WriteError> {
    let stage_err = |e: io::Error| WriteError::Stage {
        path: target.to_path_buf(),
        source: e,
    };
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let prefix = format!(".{}.{}.", name, Utc::now().timestamp_millis());
    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(TMP_SUFFIX)
        .tempfile_in(parent_dir(target))
        .map_err(stage_err)?;
    tmp.write_all(bytes).map_err(stage_err)?;
    tmp.as_file().sync_all().map_err(stage_err)?;
    Ok(tmp)
}

/// Copy the current target to `.bak` and force it down, overwriting the
/// previous backup, so exactly one prior generation is retained. Skipped
/// without error when no prior file exists.
pub(crate) fn snapshot(target: &Path) -> Result<(), WriteError> {
    if !target.exists() {
        return Ok(());
    }
    let backup = backup_path(target);
    fs::copy(target, &backup).map_err(|e| WriteError::Snapshot {
        path: backup.clone(),
        source: e,
    })?;
    File::open(&backup)
        .and_then(|f| f.sync_all())
        .map_err(|e| WriteError::Snapshot {
            path: backup,
            source: e,
        })
}

/// Atomically rename the staged file onto `target`, then fsync the target
/// and best-effort fsync its directory. After the rename the new content
/// is authoritative.
pub(crate) fn commit(staged: NamedTempFile, target: &Path) -> Result<(), WriteError> {
    let backup = backup_path(target);
    let commit_err = |e: io::Error| WriteError::Commit {
        path: target.to_path_buf(),
        backup: backup.clone(),
        source: e,
    };
    let file = staged.persist(target).map_err(|e| commit_err(e.error))?;
    file.sync_all().map_err(commit_err)?;

    // Not every platform supports syncing a directory handle.
    let dir = parent_dir(target);
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        log::warn!("directory sync after commit failed for {}: {}", dir.display(), e);
    }
    Ok(())
}

/// Remove staging litter for `target` left behind by an interrupted save.
/// Best-effort: unreadable entries are skipped. Returns how many files
/// were removed.
pub fn cleanup_stale_temps(target: &Path) -> usize {
    let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
        return 0;
    };
    let prefix = format!(".{}.", name);
    let Ok(entries) = fs::read_dir(parent_dir(target)) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.starts_with(&prefix)
            && file_name.ends_with(TMP_SUFFIX)
            && fs::remove_file(entry.path()).is_ok()
        {
            removed += 1;
        }
    }
    removed
}

fn parent_dir(target: &Path) -> &Path {
    target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
