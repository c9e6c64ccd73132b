use std::path::Path;

use crate::engine::BatchResult;
use crate::executor::RenameOutcome;

/// Trait for reporting batch progress.
///
/// The CLI implements it with indicatif. All methods default to no-ops and
/// may be called from several worker threads at once.
pub trait ProgressReporter: Send + Sync {
    fn on_batch_start(&self, _total_files: usize) {}
    fn on_file_complete(&self, _path: &Path, _outcome: &RenameOutcome) {}
    fn on_reclaim(&self, _files_done: usize) {}
    fn on_batch_complete(&self, _result: &BatchResult) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
