//! Command-line interface for reshelf.
//!
//! This module handles:
//! - Argument parsing
//! - Session setup (state directory, configuration, undo history)
//! - Dispatch to the reorganization modes and undo
//! - Mapping outcomes to process exit codes

use crate::action_log::ActionLog;
use crate::boot::{BootStatus, BootTracker, SystemUptime, UptimeSource};
use crate::classify::DomainClassifier;
use crate::config::{AppConfig, CompiledFilters};
use crate::error::OrganizeError;
use crate::organize::{Organizer, PullMode, RunReport};
use crate::output::OutputFormatter;
use crate::paths::StatePaths;
use crate::pipeline::ClassificationPipeline;
use crate::presets::Presets;
use crate::psl::PublicSuffixList;
use crate::undo::{UndoManager, UndoReport};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// The command completed and changed something.
pub const EXIT_SUCCESS: i32 = 0;
/// The input was invalid or there was nothing to do.
pub const EXIT_INVALID: i32 = 1;
/// The configuration could not be loaded.
pub const EXIT_CONFIG: i32 = 2;
/// Anything else went wrong.
pub const EXIT_FAILURE: i32 = 3;

/// Sorts files into folders by type, download source or category, and undoes it.
#[derive(Debug, Parser)]
#[command(name = "reshelf", version, about)]
pub struct Cli {
    /// Directory holding the undo history, presets and suffix list
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Configuration file to use instead of the default locations
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sort top-level files into folders by file type
    Type { dir: PathBuf },
    /// Sort top-level files into folders by the site they were downloaded from
    Source { dir: PathBuf },
    /// Move the files of one category into its folder
    Category { dir: PathBuf, category: String },
    /// Pull every file out of nested folders
    Pull {
        #[arg(long, value_enum, default_value_t = PullModeArg::All)]
        mode: PullModeArg,
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Remove empty sub-directories
    DeleteEmpty { dir: PathBuf },
    /// Undo the most recent reorganization
    Undo,
    /// Undo every recorded reorganization, newest first
    UndoAll,
    /// Show the undo history
    History,
    /// List the known categories
    Categories,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PullModeArg {
    /// Into a bin folder next to each directory
    All,
    /// Up to the top of each directory
    Here,
    /// Into the parent of each directory
    Above,
}

impl From<PullModeArg> for PullMode {
    fn from(mode: PullModeArg) -> Self {
        match mode {
            PullModeArg::All => PullMode::All,
            PullModeArg::Here => PullMode::Here,
            PullModeArg::Above => PullMode::Above,
        }
    }
}

/// Runs the parsed command and returns the process exit code.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use reshelf::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["reshelf", "type", "/home/user/Downloads"]);
/// std::process::exit(run(cli));
/// ```
pub fn run(cli: Cli) -> i32 {
    run_with_uptime(cli, SystemUptime)
}

/// [`run`] with an explicit uptime source for reboot detection.
pub fn run_with_uptime<S: UptimeSource>(cli: Cli, uptime: S) -> i32 {
    let session = match Session::open(&cli, uptime) {
        Ok(session) => session,
        Err(code) => return code,
    };

    match cli.command {
        Command::Type { dir } => {
            OutputFormatter::info(&format!("Sorting {} by type", dir.display()));
            finish_run(session.organizer().by_type(&dir))
        }
        Command::Source { dir } => session.by_source(&dir),
        Command::Category { dir, category } => {
            OutputFormatter::info(&format!("Collecting {} files in {}", category, dir.display()));
            finish_run(session.organizer().by_category(&dir, &category))
        }
        Command::Pull { mode, dirs } => finish_run(session.organizer().pull(&dirs, mode.into())),
        Command::DeleteEmpty { dir } => match session.organizer().delete_empty(&dir) {
            Ok(report) => {
                OutputFormatter::skipped(&report.skipped);
                if report.removed.is_empty() {
                    OutputFormatter::info("No empty directories found.");
                    EXIT_INVALID
                } else {
                    OutputFormatter::success(&format!(
                        "Removed {} empty {}",
                        report.removed.len(),
                        if report.removed.len() == 1 { "directory" } else { "directories" }
                    ));
                    EXIT_SUCCESS
                }
            }
            Err(e) => report_error(&e),
        },
        Command::Undo => finish_undo(UndoManager::undo_last(&session.log)),
        Command::UndoAll => finish_undo(UndoManager::undo_all(&session.log)),
        Command::History => match session.log.snapshot() {
            Ok(actions) => {
                OutputFormatter::history(&actions);
                EXIT_SUCCESS
            }
            Err(e) => report_error(&e.into()),
        },
        Command::Categories => {
            let categories = session.presets.categories();
            if categories.is_empty() {
                OutputFormatter::warning("No categories configured.");
                return EXIT_INVALID;
            }
            for category in categories {
                OutputFormatter::plain(category);
            }
            EXIT_SUCCESS
        }
    }
}

/// Everything a command needs, loaded once per process.
struct Session {
    paths: StatePaths,
    config: AppConfig,
    filters: CompiledFilters,
    presets: Presets,
    log: ActionLog,
}

impl Session {
    fn open<S: UptimeSource>(cli: &Cli, uptime: S) -> Result<Self, i32> {
        let paths = match &cli.state_dir {
            Some(dir) => StatePaths::at(dir),
            None => StatePaths::resolve().map_err(|e| {
                OutputFormatter::error(&format!("Cannot locate the state directory: {}", e));
                EXIT_FAILURE
            })?,
        };
        paths.ensure().map_err(|e| {
            OutputFormatter::error(&format!(
                "Cannot create state directory {}: {}",
                paths.dir().display(),
                e
            ));
            EXIT_FAILURE
        })?;

        let config = AppConfig::load(cli.config.as_deref(), &paths).map_err(|e| {
            OutputFormatter::error(&format!("Error loading configuration: {}", e));
            EXIT_CONFIG
        })?;
        let filters = config.filters.compile().map_err(|e| {
            OutputFormatter::error(&format!("Error compiling filters: {}", e));
            EXIT_CONFIG
        })?;

        let log = ActionLog::new(&paths, config.lock);
        let tracker = BootTracker::with_source(paths.boot_id.clone(), uptime);
        match log.reconcile_boot(&tracker) {
            Ok(BootStatus::Rebooted) => {
                OutputFormatter::warning("System restarted since the last run; undo history cleared.")
            }
            Ok(status) => debug!(?status, "boot epoch reconciled"),
            Err(e) => return Err(report_error(&e.into())),
        }

        let presets = Presets::load(&paths);

        Ok(Self {
            paths,
            config,
            filters,
            presets,
            log,
        })
    }

    fn organizer(&self) -> Organizer<'_> {
        Organizer::new(&self.log, &self.presets, &self.filters, &self.config.labels)
    }

    fn by_source(&self, dir: &Path) -> i32 {
        let psl = PublicSuffixList::load(&self.paths.public_suffix_list);
        if psl.is_empty() {
            OutputFormatter::warning(&format!(
                "No public suffix list at {}; grouping by the last two host labels",
                self.paths.public_suffix_list.display()
            ));
        }
        let pipeline = ClassificationPipeline::new(
            DomainClassifier::new(psl),
            self.config.pipeline,
        );

        OutputFormatter::info(&format!("Sorting {} by download source", dir.display()));
        let organizer = self.organizer();
        let total = organizer.candidates(dir).map_or(0, |files| files.len());
        let progress = OutputFormatter::create_progress_bar(total as u64);
        let result = organizer.by_source_with(dir, &pipeline, |_| {
            progress.inc(1);
        });
        progress.finish_and_clear();
        finish_run(result)
    }
}

fn finish_run(result: Result<RunReport, OrganizeError>) -> i32 {
    match result {
        Ok(report) => {
            OutputFormatter::skipped(&report.skipped);
            let status = run_status(&report);
            if status != EXIT_SUCCESS {
                OutputFormatter::info("Nothing to move.");
                return status;
            }
            OutputFormatter::run_summary(&report);
            OutputFormatter::success(&format!(
                "Moved {} {}. Run 'reshelf undo' to revert.",
                report.moved(),
                if report.moved() == 1 { "file" } else { "files" }
            ));
            EXIT_SUCCESS
        }
        Err(OrganizeError::NothingToDo) => {
            OutputFormatter::info("Nothing to move.");
            EXIT_INVALID
        }
        Err(e) => report_error(&e),
    }
}

/// A run is a no-op only when it pushed nothing to the log. A run that
/// created directories but moved no file still left something to undo.
fn run_status(report: &RunReport) -> i32 {
    if report.action.is_none() {
        EXIT_INVALID
    } else {
        EXIT_SUCCESS
    }
}

fn finish_undo(result: Result<Option<UndoReport>, OrganizeError>) -> i32 {
    match result {
        Ok(Some(report)) => {
            OutputFormatter::undo_summary(&report);
            if report.failed_restores.is_empty() {
                EXIT_SUCCESS
            } else {
                EXIT_FAILURE
            }
        }
        Ok(None) => {
            OutputFormatter::info("Nothing to undo.");
            EXIT_INVALID
        }
        Err(e) => report_error(&e),
    }
}

fn report_error(e: &OrganizeError) -> i32 {
    OutputFormatter::error(&e.to_string());
    match e {
        OrganizeError::InvalidBasePath { .. } | OrganizeError::NothingToDo => EXIT_INVALID,
        _ => {
            error!(error = %e, "command failed");
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::Action;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("Failed to parse arguments")
    }

    #[test]
    fn test_parse_pull_defaults_to_all() {
        let cli = parse(&["reshelf", "pull", "a", "b"]);
        match cli.command {
            Command::Pull { mode, dirs } => {
                assert_eq!(mode, PullModeArg::All);
                assert_eq!(dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = parse(&["reshelf", "undo", "--state-dir", "/tmp/state"]);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
        assert!(matches!(cli.command, Command::Undo));
    }

    #[test]
    fn test_pull_requires_a_directory() {
        assert!(Cli::try_parse_from(["reshelf", "pull"]).is_err());
    }

    #[test]
    fn test_type_then_undo_exit_codes() {
        let state = TempDir::new().expect("Failed to create temp directory");
        let work = TempDir::new().expect("Failed to create temp directory");
        fs::write(work.path().join("a.jpg"), "jpg").unwrap();
        let state_arg = state.path().to_string_lossy().into_owned();
        let work_arg = work.path().to_string_lossy().into_owned();

        let code = run(parse(&["reshelf", "--state-dir", &state_arg, "type", &work_arg]));
        assert_eq!(code, EXIT_SUCCESS);
        assert!(work.path().join("Images").join("a.jpg").is_file());

        let code = run(parse(&["reshelf", "--state-dir", &state_arg, "type", &work_arg]));
        assert_eq!(code, EXIT_INVALID);

        let code = run(parse(&["reshelf", "--state-dir", &state_arg, "undo"]));
        assert_eq!(code, EXIT_SUCCESS);
        assert!(work.path().join("a.jpg").is_file());

        let code = run(parse(&["reshelf", "--state-dir", &state_arg, "undo"]));
        assert_eq!(code, EXIT_INVALID);
    }

    #[test]
    fn test_run_status_follows_the_logged_action() {
        assert_eq!(run_status(&RunReport::default()), EXIT_INVALID);

        let dirs_only = RunReport {
            action: Some(Action {
                created_dirs: [PathBuf::from("/tmp/work/Images")].into(),
                ..Action::default()
            }),
            ..RunReport::default()
        };
        assert_eq!(dirs_only.moved(), 0);
        assert_eq!(run_status(&dirs_only), EXIT_SUCCESS);
    }

    #[test]
    fn test_missing_directory_is_invalid() {
        let state = TempDir::new().expect("Failed to create temp directory");
        let state_arg = state.path().to_string_lossy().into_owned();
        let missing = state.path().join("missing").to_string_lossy().into_owned();

        let code = run(parse(&["reshelf", "--state-dir", &state_arg, "type", &missing]));
        assert_eq!(code, EXIT_INVALID);
    }

    #[test]
    fn test_bad_explicit_config_exit_code() {
        let state = TempDir::new().expect("Failed to create temp directory");
        let config = state.path().join("broken.toml");
        fs::write(&config, "[filters\nbroken").unwrap();
        let state_arg = state.path().to_string_lossy().into_owned();
        let config_arg = config.to_string_lossy().into_owned();

        let code = run(parse(&[
            "reshelf",
            "--state-dir",
            &state_arg,
            "--config",
            &config_arg,
            "history",
        ]));
        assert_eq!(code, EXIT_CONFIG);
    }
}
