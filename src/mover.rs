//! Collision-safe file moves and the [`Action`] record they produce.
//!
//! Every reorganization mode moves files through [`move_into`], which creates
//! the destination directory when needed, picks a free file name, performs
//! the move, and records both facts in the run's [`Action`].

use crate::error::{OrganizeError, OrganizeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One reversible batch of work: the moves performed by a single run and the
/// directories it created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// `(source, destination)` pairs in the order they happened.
    #[serde(default)]
    pub moves: Vec<(PathBuf, PathBuf)>,
    #[serde(default)]
    pub created_dirs: BTreeSet<PathBuf>,
    /// Name of the mode that produced this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Action {
    pub fn new(mode: &str) -> Self {
        Self {
            mode: Some(mode.to_string()),
            recorded_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn record_move(&mut self, source: PathBuf, destination: PathBuf) {
        self.moves.push((source, destination));
    }

    pub fn record_created_dirs(&mut self, dirs: impl IntoIterator<Item = PathBuf>) {
        self.created_dirs.extend(dirs);
    }

    /// True when the run changed nothing on disk.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.created_dirs.is_empty()
    }
}

/// Creates `dir` and any missing ancestors, returning the directories that
/// did not exist before, outermost first. Returns an empty list when `dir`
/// already exists.
pub fn ensure_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut cursor = Some(dir);
    while let Some(path) = cursor {
        if path.as_os_str().is_empty() || path.exists() {
            break;
        }
        missing.push(path.to_path_buf());
        cursor = path.parent();
    }

    if missing.is_empty() {
        return Ok(missing);
    }

    fs::create_dir_all(dir)?;
    missing.reverse();
    Ok(missing)
}

/// First free path for `file_name` inside `dir`: the name itself, then
/// `stem (1).ext`, `stem (2).ext`, and so on.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    first_free(dir.join(file_name), |n| {
        dir.join(numbered_name(file_name, &format!(" ({n})")))
    })
    .unwrap_or_else(|| dir.join(file_name))
}

/// First free path to restore `original` to: the path itself, then
/// `stem (restored 1).ext`, `stem (restored 2).ext`, ...
pub fn unique_restore_path(original: &Path) -> PathBuf {
    let Some(name) = original.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return original.to_path_buf();
    };
    let parent = original.parent().unwrap_or_else(|| Path::new(""));
    first_free(original.to_path_buf(), |n| {
        parent.join(numbered_name(&name, &format!(" (restored {n})")))
    })
    .unwrap_or_else(|| original.to_path_buf())
}

fn first_free(
    candidate: PathBuf,
    mut numbered: impl FnMut(u64) -> PathBuf,
) -> Option<PathBuf> {
    if !exists(&candidate) {
        return Some(candidate);
    }
    (1..=u64::MAX).map(&mut numbered).find(|p| !exists(p))
}

// Broken symlinks still occupy the name.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Inserts `suffix` between the stem and the extension of `file_name`.
fn numbered_name(file_name: &str, suffix: &str) -> String {
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            format!("{}{}.{}", stem.to_string_lossy(), suffix, ext.to_string_lossy())
        }
        _ => format!("{file_name}{suffix}"),
    }
}

/// Moves `source` to `destination`, renaming when both are on the same volume
/// and falling back to copy + remove across volumes.
pub fn relocate(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                src = %source.display(),
                dest = %destination.display(),
                "rename crosses volumes, falling back to copy+remove"
            );
            copy_then_remove(source, destination)
        }
        Err(e) => Err(e),
    }
}

/// Cross-volume move. On failure only `source` remains.
fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let moved = fs::copy(source, destination).and_then(|_| fs::remove_file(source));
    if moved.is_err() && source.exists() {
        let _ = fs::remove_file(destination);
    }
    moved
}

/// Moves `source` into `dest_dir` without overwriting anything and records
/// the move, plus every directory it had to create, in `action`.
///
/// Returns the final destination path.
pub fn move_into(action: &mut Action, source: &Path, dest_dir: &Path) -> OrganizeResult<PathBuf> {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| OrganizeError::FileMoveFailure {
            from: source.to_path_buf(),
            to: dest_dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "file has no name component"),
        })?;

    let created = ensure_dir(dest_dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;
    action.record_created_dirs(created);

    let destination = unique_destination(dest_dir, &file_name);
    relocate(source, &destination).map_err(|e| OrganizeError::FileMoveFailure {
        from: source.to_path_buf(),
        to: destination.clone(),
        source: e,
    })?;

    debug!(src = %source.display(), dest = %destination.display(), "moved");
    action.record_move(source.to_path_buf(), destination.clone());
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_then_remove_moves_content() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("report.pdf");
        let destination = temp_dir.path().join("Documents").join("report.pdf");
        fs::create_dir(temp_dir.path().join("Documents")).unwrap();
        fs::write(&source, "pdf bytes").unwrap();

        copy_then_remove(&source, &destination).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "pdf bytes");
    }

    #[test]
    fn test_copy_then_remove_failure_leaves_no_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("gone.txt");
        let destination = temp_dir.path().join("gone copy.txt");

        let err = copy_then_remove(&source, &destination).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!destination.exists());
    }

    #[test]
    fn test_copy_then_remove_into_missing_dir_keeps_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("keep.txt");
        fs::write(&source, "keep").unwrap();
        let destination = temp_dir.path().join("no such dir").join("keep.txt");

        assert!(copy_then_remove(&source, &destination).is_err());

        assert_eq!(fs::read_to_string(&source).unwrap(), "keep");
        assert!(!destination.exists());
    }

    #[test]
    fn test_move_into_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();

        let file_path = base_path.join("test.txt");
        fs::write(&file_path, "test content").expect("Failed to write test file");

        let mut action = Action::new("test");
        let dest = move_into(&mut action, &file_path, &base_path.join("Documents"))
            .expect("Failed to move file");

        assert_eq!(dest, base_path.join("Documents").join("test.txt"));
        assert!(!file_path.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "test content");
        assert_eq!(action.moves, vec![(file_path, dest)]);
        assert!(action.created_dirs.contains(&base_path.join("Documents")));
    }

    #[test]
    fn test_existing_directory_is_not_recorded() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("Images")).unwrap();
        fs::write(base_path.join("a.png"), "png").unwrap();

        let mut action = Action::new("test");
        move_into(&mut action, &base_path.join("a.png"), &base_path.join("Images")).unwrap();

        assert!(action.created_dirs.is_empty());
        assert_eq!(action.moves.len(), 1);
    }

    #[test]
    fn test_collision_gets_numbered_suffix() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let images = base_path.join("Images");
        fs::create_dir(&images).unwrap();
        fs::write(images.join("a.jpg"), "old").unwrap();
        fs::write(base_path.join("a.jpg"), "new").unwrap();

        let mut action = Action::new("test");
        let dest = move_into(&mut action, &base_path.join("a.jpg"), &images).unwrap();

        assert_eq!(dest, images.join("a (1).jpg"));
        assert_eq!(fs::read_to_string(images.join("a.jpg")).unwrap(), "old");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_collision_counter_increments() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path();
        fs::write(dir.join("report.pdf"), "").unwrap();
        fs::write(dir.join("report (1).pdf"), "").unwrap();

        assert_eq!(unique_destination(dir, "report.pdf"), dir.join("report (2).pdf"));
        assert_eq!(unique_destination(dir, "fresh.pdf"), dir.join("fresh.pdf"));
    }

    #[test]
    fn test_numbered_name_without_extension() {
        assert_eq!(numbered_name("Makefile", " (1)"), "Makefile (1)");
        assert_eq!(numbered_name("archive.tar.gz", " (1)"), "archive.tar (1).gz");
        assert_eq!(numbered_name(".bashrc", " (1)"), ".bashrc (1)");
    }

    #[test]
    fn test_unique_restore_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let original = temp_dir.path().join("notes.txt");

        assert_eq!(unique_restore_path(&original), original);
        fs::write(&original, "").unwrap();
        assert_eq!(
            unique_restore_path(&original),
            temp_dir.path().join("notes (restored 1).txt")
        );
    }

    #[test]
    fn test_ensure_dir_reports_created_ancestors() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let deep = temp_dir.path().join("a").join("b").join("c");

        let created = ensure_dir(&deep).unwrap();
        assert_eq!(
            created,
            vec![
                temp_dir.path().join("a"),
                temp_dir.path().join("a").join("b"),
                deep.clone(),
            ]
        );
        assert!(ensure_dir(&deep).unwrap().is_empty());
    }

    #[test]
    fn test_action_serializes_as_pairs() {
        let mut action = Action::default();
        action.record_move(PathBuf::from("/d/a.jpg"), PathBuf::from("/d/Images/a.jpg"));
        action.record_created_dirs([PathBuf::from("/d/Images")]);

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "moves": [["/d/a.jpg", "/d/Images/a.jpg"]],
                "created_dirs": ["/d/Images"],
            })
        );

        let parsed: Action = serde_json::from_str(r#"{"moves": [["/x", "/y/x"]]}"#).unwrap();
        assert_eq!(parsed.moves.len(), 1);
        assert!(parsed.created_dirs.is_empty());
        assert!(parsed.mode.is_none());
    }
}
