//! Output formatting and styling module.
//!
//! Everything the binary prints goes through [`OutputFormatter`]. Diagnostics
//! go through `tracing` instead and land on stderr.

use crate::mover::Action;
use crate::organize::{RunReport, Skipped};
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Styled terminal output for the `reshelf` commands.
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Goes to stderr, unlike the other message kinds.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{message}");
    }

    fn header(title: &str) {
        println!("\n{}", title.bold());
    }

    /// Progress for the classification phase of a by-source run.
    ///
    /// ```no_run
    /// use reshelf::output::OutputFormatter;
    /// let bar = OutputFormatter::create_progress_bar(100);
    /// bar.inc(1);
    /// bar.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} classifying [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("█▓░"));
        bar
    }

    /// Files moved per destination folder, sorted by folder name.
    pub fn run_summary(report: &RunReport) {
        if report.per_folder.is_empty() {
            return;
        }

        let mut folders: Vec<_> = report.per_folder.iter().collect();
        folders.sort_by_key(|&(name, _)| name);
        let width = folders
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Folder".len());
        let rule = "-".repeat(width + 10);

        Self::header("MOVED");
        println!("{:<width$} | {}", "Folder".bold(), "Files".bold());
        println!("{rule}");
        for (folder, count) in folders {
            println!("{:<width$} | {}", folder, count.to_string().green());
        }
        println!("{rule}");
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            report.moved().to_string().green().bold()
        );
    }

    /// Lists the files a run left in place.
    pub fn skipped(items: &[Skipped]) {
        if items.is_empty() {
            return;
        }
        Self::warning(&format!("Skipped {} {}", items.len(), plural(items.len())));
        for item in items {
            println!("    - {}: {}", item.path.display(), item.reason);
        }
    }

    /// Prints what an undo restored, skipped and failed to restore.
    pub fn undo_summary(report: &UndoReport) {
        Self::success(&format!(
            "Restored {} {} from {} {}",
            report.restored_files,
            plural(report.restored_files),
            report.actions,
            if report.actions == 1 { "action" } else { "actions" },
        ));

        for path in &report.renamed_restores {
            Self::warning(&format!("Original path taken, restored as {}", path.display()));
        }
        if !report.skipped_files.is_empty() {
            Self::warning(&format!(
                "Skipped {} moved {} that no longer exist",
                report.skipped_files.len(),
                plural(report.skipped_files.len())
            ));
            for path in &report.skipped_files {
                println!("    - {}", path.display());
            }
        }
        for (path, reason) in &report.failed_restores {
            Self::error(&format!("{}: {}", path.display(), reason));
        }
        if !report.removed_dirs.is_empty() {
            Self::info(&format!(
                "Removed {} empty {}",
                report.removed_dirs.len(),
                if report.removed_dirs.len() == 1 { "directory" } else { "directories" }
            ));
        }
    }

    /// Prints the undo stack, newest first.
    pub fn history(actions: &[Action]) {
        if actions.is_empty() {
            Self::info("Nothing to undo.");
            return;
        }

        Self::header("UNDO HISTORY");
        for (position, action) in actions.iter().rev().enumerate() {
            let when = action
                .recorded_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>3}. {:<8} {} {} {}",
                position + 1,
                action.mode.as_deref().unwrap_or("?").bold(),
                when.dimmed(),
                action.moves.len().to_string().green(),
                plural(action.moves.len()),
            );
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
