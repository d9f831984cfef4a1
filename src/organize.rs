//! Reorganization modes.
//!
//! Each mode scans its target, moves files one at a time through
//! [`move_into`], collects the resulting [`Action`] and pushes it to the
//! [`ActionLog`]. Files that cannot be moved are skipped and reported; they
//! never abort the run, and the recorded action only contains what actually
//! happened.

use crate::action_log::ActionLog;
use crate::config::{CompiledFilters, Labels};
use crate::error::{OrganizeError, OrganizeResult};
use crate::mover::{Action, move_into};
use crate::pipeline::{ClassificationPipeline, ClassificationResult};
use crate::presets::Presets;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const MODE_BY_TYPE: &str = "type";
pub const MODE_BY_SOURCE: &str = "source";
pub const MODE_BY_CATEGORY: &str = "category";
pub const MODE_PULL: &str = "pull";

/// A file or directory the run left alone, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

impl Skipped {
    fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of one reorganization run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// The action pushed to the log, if the run changed anything.
    pub action: Option<Action>,
    pub skipped: Vec<Skipped>,
    /// Number of files per destination directory name.
    pub per_folder: HashMap<String, usize>,
}

impl RunReport {
    pub fn moved(&self) -> usize {
        self.action.as_ref().map_or(0, |a| a.moves.len())
    }
}

/// Outcome of [`Organizer::delete_empty`].
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
}

/// Where [`Organizer::pull`] sends the files it collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PullMode {
    /// Into a `Files Bin` folder next to each pulled directory.
    #[default]
    All,
    /// Up to the top level of each pulled directory.
    Here,
    /// Into the parent of each pulled directory.
    Above,
}

/// Runs reorganization modes against the filesystem and records them.
pub struct Organizer<'a> {
    log: &'a ActionLog,
    presets: &'a Presets,
    filters: &'a CompiledFilters,
    labels: &'a Labels,
}

impl<'a> Organizer<'a> {
    pub fn new(
        log: &'a ActionLog,
        presets: &'a Presets,
        filters: &'a CompiledFilters,
        labels: &'a Labels,
    ) -> Self {
        Self {
            log,
            presets,
            filters,
            labels,
        }
    }

    /// Moves every top-level file into a folder named after its preset
    /// category, or the "other files" folder.
    pub fn by_type(&self, dir: &Path) -> OrganizeResult<RunReport> {
        let dir = target_dir(dir)?;
        let mut run = Run::new(MODE_BY_TYPE);

        for file in self.top_level_files(&dir)? {
            let folder = self
                .presets
                .category_for(&file)
                .unwrap_or(self.labels.other_files.as_str());
            run.move_file(&file, &dir, folder);
        }

        self.commit(run, &dir)
    }

    /// Moves every top-level file into a folder named after the site it was
    /// downloaded from, or the "unknown sources" folder.
    pub fn by_source(
        &self,
        dir: &Path,
        pipeline: &ClassificationPipeline,
    ) -> OrganizeResult<RunReport> {
        self.by_source_with(dir, pipeline, |_| {})
    }

    /// [`by_source`](Self::by_source), reporting each classification as it
    /// completes.
    pub fn by_source_with(
        &self,
        dir: &Path,
        pipeline: &ClassificationPipeline,
        on_result: impl FnMut(&ClassificationResult),
    ) -> OrganizeResult<RunReport> {
        let dir = target_dir(dir)?;
        let files = self.top_level_files(&dir)?;

        let labels: HashMap<PathBuf, Option<String>> = pipeline
            .classify_all_with(&files, on_result)
            .into_iter()
            .map(|r| (r.path, r.label))
            .collect();

        let mut run = Run::new(MODE_BY_SOURCE);
        for file in &files {
            let folder = labels
                .get(file)
                .and_then(Option::as_deref)
                .unwrap_or(self.labels.unknown_sources.as_str());
            run.move_file(file, &dir, folder);
        }

        self.commit(run, &dir)
    }

    /// Moves only the top-level files whose preset category is `category`.
    pub fn by_category(&self, dir: &Path, category: &str) -> OrganizeResult<RunReport> {
        let dir = target_dir(dir)?;
        let mut run = Run::new(MODE_BY_CATEGORY);

        for file in self.top_level_files(&dir)? {
            if self.presets.category_for(&file) == Some(category) {
                run.move_file(&file, &dir, category);
            }
        }

        self.commit(run, &dir)
    }

    /// Collects every file below each of `dirs` into one place, chosen by
    /// `mode`. Entries that are not directories are ignored.
    ///
    /// Returns [`OrganizeError::NothingToDo`] when no directory held a file
    /// to move.
    pub fn pull(&self, dirs: &[PathBuf], mode: PullMode) -> OrganizeResult<RunReport> {
        let mut run = Run::new(MODE_PULL);
        let mut candidates = 0usize;

        for dir in dirs {
            let Ok(dir) = target_dir(dir) else {
                warn!(path = %dir.display(), "not a directory, skipping");
                continue;
            };

            // Snapshot first so files moved into the tree are not revisited.
            let files: Vec<PathBuf> = WalkDir::new(&dir)
                .min_depth(1)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .filter(|p| !self.filters.is_ignored(p))
                .collect();

            let destination = match mode {
                PullMode::All => dir
                    .parent()
                    .unwrap_or(dir.as_path())
                    .join(&self.labels.files_bin),
                PullMode::Here => dir.clone(),
                PullMode::Above => match dir.parent() {
                    Some(parent) => parent.to_path_buf(),
                    None => continue,
                },
            };

            for file in files {
                if mode == PullMode::Here && file.parent() == Some(dir.as_path()) {
                    continue;
                }
                candidates += 1;
                run.move_to(&file, &destination);
            }
        }

        if candidates == 0 {
            return Err(OrganizeError::NothingToDo);
        }
        let scope = dirs.first().cloned().unwrap_or_default();
        self.commit(run, &scope)
    }

    /// Removes empty sub-directories of `dir`, repeating until a pass removes
    /// nothing. `dir` itself is never removed. This is not recorded in the
    /// action log.
    pub fn delete_empty(&self, dir: &Path) -> OrganizeResult<DeleteReport> {
        let dir = target_dir(dir)?;
        let mut report = DeleteReport::default();
        let mut failed: HashSet<PathBuf> = HashSet::new();

        loop {
            let mut removed_any = false;

            let empty_dirs = WalkDir::new(&dir)
                .min_depth(1)
                .contents_first(true)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_dir())
                .map(walkdir::DirEntry::into_path);

            for candidate in empty_dirs {
                if failed.contains(&candidate) || !is_empty_dir(&candidate) {
                    continue;
                }
                match fs::remove_dir(&candidate) {
                    Ok(()) => {
                        removed_any = true;
                        report.removed.push(candidate);
                    }
                    Err(e) => {
                        warn!(path = %candidate.display(), error = %e, "could not remove directory");
                        report.skipped.push(Skipped::new(&candidate, e));
                        failed.insert(candidate);
                    }
                }
            }

            if !removed_any {
                break;
            }
        }

        info!(
            dir = %dir.display(),
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            "removed empty directories"
        );
        Ok(report)
    }

    /// The top-level files a by-type, by-source or by-category run over
    /// `dir` would consider. Ignored files and provenance sidecars are left
    /// out.
    pub fn candidates(&self, dir: &Path) -> OrganizeResult<Vec<PathBuf>> {
        self.top_level_files(&target_dir(dir)?)
    }

    fn top_level_files(&self, dir: &Path) -> OrganizeResult<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|e| OrganizeError::invalid_base(dir, e))?;

        Ok(entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.path())
            .filter(|path| !self.filters.is_ignored(path))
            .collect())
    }

    fn commit(&self, run: Run, scope: &Path) -> OrganizeResult<RunReport> {
        let Run {
            action,
            skipped,
            per_folder,
        } = run;

        info!(
            mode = action.mode.as_deref().unwrap_or_default(),
            dir = %scope.display(),
            moved = action.moves.len(),
            created_dirs = action.created_dirs.len(),
            skipped = skipped.len(),
            "reorganization finished"
        );

        let action = if action.is_empty() {
            None
        } else {
            self.log.push(action.clone())?;
            Some(action)
        };

        Ok(RunReport {
            action,
            skipped,
            per_folder,
        })
    }
}

/// In-progress state of one run.
struct Run {
    action: Action,
    skipped: Vec<Skipped>,
    per_folder: HashMap<String, usize>,
}

impl Run {
    fn new(mode: &str) -> Self {
        Self {
            action: Action::new(mode),
            skipped: Vec::new(),
            per_folder: HashMap::new(),
        }
    }

    fn move_file(&mut self, file: &Path, base: &Path, folder: &str) {
        if self.move_to(file, &base.join(folder)) {
            *self.per_folder.entry(folder.to_string()).or_insert(0) += 1;
        }
    }

    fn move_to(&mut self, file: &Path, dest_dir: &Path) -> bool {
        match move_into(&mut self.action, file, dest_dir) {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "skipping file");
                self.skipped.push(Skipped::new(file, e));
                false
            }
        }
    }
}

/// Validates the target and makes it absolute so recorded paths stay valid
/// regardless of the working directory of a later undo.
fn target_dir(dir: &Path) -> OrganizeResult<PathBuf> {
    let metadata = fs::metadata(dir).map_err(|e| OrganizeError::invalid_base(dir, e))?;
    if !metadata.is_dir() {
        return Err(OrganizeError::invalid_base(
            dir,
            io::Error::from(io::ErrorKind::NotADirectory),
        ));
    }
    std::path::absolute(dir).map_err(|e| OrganizeError::invalid_base(dir, e))
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}
