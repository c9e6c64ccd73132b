use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use colored::*;
use export_renamer_core::executor::RenameOutcome;
use export_renamer_core::{BatchResult, ProgressReporter};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Batch progress bar on stderr; hidden when `quiet` is set.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl CliReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressReporter for CliReporter {
    fn on_batch_start(&self, total_files: usize) {
        let pb = ProgressBar::new(total_files as u64);
        if self.quiet {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Renaming [{bar:30.cyan/dim}] {pos}/{len} files {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Some(old) = self.bar().replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_file_complete(&self, path: &Path, outcome: &RenameOutcome) {
        let guard = self.bar();
        let Some(pb) = guard.as_ref() else {
            return;
        };
        pb.inc(1);
        if let RenameOutcome::Failed { error, .. } = outcome {
            pb.println(format!(
                "  {} {}: {}",
                "✗".red(),
                path.display(),
                error
            ));
        }
    }

    fn on_reclaim(&self, files_done: usize) {
        if let Some(pb) = self.bar().as_ref() {
            pb.set_message(format!("(resources released at {})", files_done));
        }
    }

    fn on_batch_complete(&self, result: &BatchResult) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
        if self.quiet {
            return;
        }
        let mark = if result.cancelled {
            "!".yellow()
        } else {
            "✓".green()
        };
        eprintln!(
            "  {} Batch finished: {} files in {:.2}s",
            mark, result.attempted, result.elapsed_secs
        );
    }
}
