/// Undo functionality for reverting reorganizations.
///
/// Actions are replayed backwards: each recorded move is reversed, newest
/// first, and the directories the run created are removed once they are
/// empty again.
use crate::action_log::ActionLog;
use crate::error::OrganizeResult;
use crate::mover::{Action, relocate, unique_restore_path};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Represents the result of an undo operation.
#[derive(Debug, Default, Clone)]
pub struct UndoReport {
    /// Number of files moved back.
    pub restored_files: usize,
    /// Files restored under a `(restored n)` name because the original path
    /// was taken.
    pub renamed_restores: Vec<PathBuf>,
    /// Files that failed to restore, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Moves whose destination no longer exists.
    pub skipped_files: Vec<PathBuf>,
    /// Created directories removed because they were empty.
    pub removed_dirs: Vec<PathBuf>,
    /// Number of actions replayed.
    pub actions: usize,
}

impl UndoReport {
    /// Returns the total number of moves processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every move was reversed.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }

    fn merge(&mut self, other: UndoReport) {
        self.restored_files += other.restored_files;
        self.renamed_restores.extend(other.renamed_restores);
        self.failed_restores.extend(other.failed_restores);
        self.skipped_files.extend(other.skipped_files);
        self.removed_dirs.extend(other.removed_dirs);
        self.actions += other.actions;
    }
}

/// Manages undo operations.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent action on the log.
    ///
    /// Returns `Ok(None)` when there is nothing to undo. The action is only
    /// removed from the log after it has been replayed.
    pub fn undo_last(log: &ActionLog) -> OrganizeResult<Option<UndoReport>> {
        let report = log.consume_last(Self::replay)?;
        if let Some(report) = &report {
            info!(
                restored = report.restored_files,
                skipped = report.skipped_files.len(),
                failed = report.failed_restores.len(),
                "undid last action"
            );
        }
        Ok(report)
    }

    /// Undoes every action on the log, newest first.
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    pub fn undo_all(log: &ActionLog) -> OrganizeResult<Option<UndoReport>> {
        let reports = log.consume_all(Self::replay)?;
        if reports.is_empty() {
            return Ok(None);
        }

        let mut total = UndoReport::default();
        for report in reports {
            total.merge(report);
        }
        info!(
            actions = total.actions,
            restored = total.restored_files,
            "undid all actions"
        );
        Ok(Some(total))
    }

    /// Reverses one action on the filesystem.
    ///
    /// # Edge Cases Handled
    ///
    /// * **Destination gone**: the move is skipped, not an error
    /// * **Original path taken**: restored as `name (restored n).ext`
    /// * **Original directory gone**: recreated before the file is moved back
    /// * **Created directory not empty**: left in place
    pub fn replay(action: &Action) -> UndoReport {
        let mut report = UndoReport {
            actions: 1,
            ..UndoReport::default()
        };

        for (source, destination) in action.moves.iter().rev() {
            if destination.symlink_metadata().is_err() {
                debug!(path = %destination.display(), "moved file is gone, skipping");
                report.skipped_files.push(destination.clone());
                continue;
            }

            match Self::restore_file(source, destination) {
                Ok(restored_to) => {
                    report.restored_files += 1;
                    if restored_to != *source {
                        report.renamed_restores.push(restored_to);
                    }
                }
                Err(reason) => {
                    warn!(path = %destination.display(), %reason, "could not restore file");
                    report.failed_restores.push((destination.clone(), reason));
                }
            }
        }

        // Deepest first, so nested directories empty out before their parents.
        let mut dirs: Vec<&PathBuf> = action.created_dirs.iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse((d.components().count(), d.as_os_str().len())));
        for dir in dirs {
            if is_empty_dir(dir) {
                match fs::remove_dir(dir) {
                    Ok(()) => report.removed_dirs.push(dir.clone()),
                    Err(e) => debug!(path = %dir.display(), error = %e, "could not remove directory"),
                }
            }
        }

        report
    }

    /// Moves `destination` back to `source`, or next to it when taken.
    fn restore_file(source: &Path, destination: &Path) -> Result<PathBuf, String> {
        if let Some(parent) = source.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Could not recreate {}: {}", parent.display(), e))?;
        }

        let target = unique_restore_path(source);
        relocate(destination, &target).map_err(|e| format!("Failed to restore file: {}", e))?;
        Ok(target)
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}
