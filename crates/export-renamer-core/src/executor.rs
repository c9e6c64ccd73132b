use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::collision;
use crate::convert::{ConversionOutcome, ConversionTrigger};

const DEFAULT_MAX_NAME_BYTES: usize = 255;
const MAX_RENAME_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub original_path: PathBuf,
    pub candidate_name: String,
    /// Unique in the directory at the moment the plan was made.
    pub final_name: String,
    pub triggers_conversion: bool,
}

impl RenamePlan {
    pub fn final_path(&self) -> PathBuf {
        parent_dir(&self.original_path).join(&self.final_name)
    }
}

/// Terminal state of one file.
#[derive(Debug)]
pub enum RenameOutcome {
    SkippedUnchanged,
    /// Dry run: the rename was planned but not applied.
    Planned(RenamePlan),
    Renamed {
        plan: RenamePlan,
        conversion: ConversionOutcome,
    },
    Failed {
        final_name: Option<String>,
        error: io::Error,
    },
}

impl RenameOutcome {
    pub fn failed(error: io::Error) -> Self {
        Self::Failed {
            final_name: None,
            error,
        }
    }
}

/// Applies renames within a single directory and fires conversion afterwards.
///
/// The free-name search and the rename run under a per-directory lock, so
/// concurrent workers never claim the same free slot. The rename itself never
/// replaces an existing entry.
pub struct RenameExecutor {
    trigger: ConversionTrigger,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
    dry_run: bool,
    max_name_bytes: usize,
}

impl RenameExecutor {
    pub fn new(trigger: ConversionTrigger) -> Self {
        Self {
            trigger,
            locks: DashMap::new(),
            dry_run: false,
            max_name_bytes: DEFAULT_MAX_NAME_BYTES,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Length limit kept by collision counters.
    pub fn with_max_name_bytes(mut self, max_name_bytes: usize) -> Self {
        self.max_name_bytes = max_name_bytes;
        self
    }

    pub fn trigger(&self) -> &ConversionTrigger {
        &self.trigger
    }

    pub fn execute(&self, original_path: &Path, candidate_name: &str) -> RenameOutcome {
        let original_name = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if original_name == candidate_name {
            info!(file = original_name.as_str(), "Skipped: no change needed or no name found");
            return RenameOutcome::SkippedUnchanged;
        }

        let plan = match self.claim_and_rename(
            original_path,
            &original_name,
            candidate_name,
            collision::make_unique,
        ) {
            Ok(plan) => plan,
            Err(outcome) => return outcome,
        };
        info!("Renamed: {} -> {}", original_name, plan.final_name);

        let conversion = if plan.triggers_conversion {
            self.trigger.fire(&plan.final_path())
        } else {
            ConversionOutcome::Skipped
        };

        RenameOutcome::Renamed { plan, conversion }
    }

    /// Finds a free name and moves the file there without replacing
    /// anything. A name taken between lookup and rename, e.g. by another
    /// process, is looked up again, up to `MAX_RENAME_ATTEMPTS` times.
    ///
    /// `Err` carries the terminal outcome when no rename took place.
    fn claim_and_rename(
        &self,
        original_path: &Path,
        original_name: &str,
        candidate_name: &str,
        find_free: impl Fn(&Path, &str, usize) -> io::Result<String>,
    ) -> Result<RenamePlan, RenameOutcome> {
        let directory = parent_dir(original_path);
        let lock = self.directory_lock(&directory);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut attempt = 1;
        loop {
            let final_name = match find_free(&directory, candidate_name, self.max_name_bytes) {
                Ok(name) => name,
                Err(error) => {
                    error!(file = original_name, "Error finding a free name: {}", error);
                    return Err(RenameOutcome::Failed {
                        final_name: None,
                        error,
                    });
                }
            };
            if final_name != candidate_name {
                debug!(
                    candidate = candidate_name,
                    final_name = final_name.as_str(),
                    "Candidate name taken, using next free slot"
                );
            }

            let plan = RenamePlan {
                original_path: original_path.to_path_buf(),
                candidate_name: candidate_name.to_string(),
                triggers_conversion: self.trigger.qualifies(&final_name),
                final_name,
            };

            if self.dry_run {
                info!(
                    file = original_name,
                    "Would rename: {} -> {}", original_name, plan.final_name
                );
                return Err(RenameOutcome::Planned(plan));
            }

            match collision::rename_noclobber(original_path, &plan.final_path()) {
                Ok(()) => return Ok(plan),
                Err(error)
                    if error.kind() == io::ErrorKind::AlreadyExists
                        && attempt < MAX_RENAME_ATTEMPTS =>
                {
                    warn!(
                        file = original_name,
                        target = plan.final_name.as_str(),
                        attempt,
                        "Target appeared before rename, looking up again"
                    );
                    attempt += 1;
                }
                Err(error) => {
                    error!("Error renaming {}: {}", original_name, error);
                    return Err(RenameOutcome::Failed {
                        final_name: Some(plan.final_name),
                        error,
                    });
                }
            }
        }
    }

    fn directory_lock(&self, directory: &Path) -> Arc<Mutex<()>> {
        let key = directory
            .canonicalize()
            .unwrap_or_else(|_| directory.to_path_buf());
        self.locks.entry(key).or_default().clone()
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use std::cell::Cell;
    use std::fs;
    use crate::convert::DisabledConverter;
    use tempfile::tempdir;

    fn executor() -> RenameExecutor {
        RenameExecutor::new(ConversionTrigger::new(
            Arc::new(DisabledConverter),
            ConversionConfig::default(),
        ))
    }

    #[test]
    fn test_same_name_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "n").unwrap();
        assert!(matches!(
            executor().execute(&path, "notes.txt"),
            RenameOutcome::SkippedUnchanged
        ));
        assert!(path.exists());
    }

    #[test]
    fn test_rename_with_collision() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.txt");
        fs::write(&path, "s").unwrap();
        fs::write(dir.path().join("A.txt"), "a").unwrap();

        match executor().execute(&path, "A.txt") {
            RenameOutcome::Renamed { plan, conversion } => {
                assert_eq!(plan.final_name, "A(1).txt");
                assert!(!plan.triggers_conversion);
                assert!(matches!(conversion, ConversionOutcome::Skipped));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fs::read_to_string(dir.path().join("A.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dir.path().join("A(1).txt")).unwrap(), "s");
        assert!(!path.exists());
    }

    #[test]
    fn test_target_created_after_lookup_survives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.txt");
        fs::write(&path, "mine").unwrap();

        // Another writer takes the chosen name before the rename runs.
        let lookups = Cell::new(0);
        let find_free = |directory: &Path, candidate: &str, max: usize| -> io::Result<String> {
            let name = collision::make_unique(directory, candidate, max)?;
            if lookups.replace(lookups.get() + 1) == 0 {
                fs::write(directory.join(&name), "theirs")?;
            }
            Ok(name)
        };

        let plan = executor()
            .claim_and_rename(&path, "source.txt", "A.txt", find_free)
            .unwrap();
        assert_eq!(plan.final_name, "A(1).txt");
        assert_eq!(lookups.get(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("A.txt")).unwrap(), "theirs");
        assert_eq!(fs::read_to_string(dir.path().join("A(1).txt")).unwrap(), "mine");
        assert!(!path.exists());
    }

    #[test]
    fn test_target_always_taken_fails_without_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.txt");
        fs::write(&path, "mine").unwrap();
        fs::write(dir.path().join("A.txt"), "theirs").unwrap();

        // A lookup that keeps answering with an occupied name.
        let find_free =
            |_: &Path, candidate: &str, _: usize| -> io::Result<String> { Ok(candidate.to_string()) };
        match executor().claim_and_rename(&path, "source.txt", "A.txt", find_free) {
            Err(RenameOutcome::Failed { final_name, error }) => {
                assert_eq!(final_name.as_deref(), Some("A.txt"));
                assert_eq!(error.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(fs::read_to_string(dir.path().join("A.txt")).unwrap(), "theirs");
        assert_eq!(fs::read_to_string(&path).unwrap(), "mine");
    }

    #[test]
    fn test_vanished_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        match executor().execute(&path, "new.txt") {
            RenameOutcome::Failed { final_name, error } => {
                assert_eq!(final_name.as_deref(), Some("new.txt"));
                assert_eq!(error.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_conversion_failure_keeps_rename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.html");
        fs::write(&path, "<html></html>").unwrap();

        match executor().execute(&path, "Jane Doe.html") {
            RenameOutcome::Renamed { plan, conversion } => {
                assert!(plan.triggers_conversion);
                assert!(matches!(conversion, ConversionOutcome::Failed(_)));
                assert!(plan.final_path().exists());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_dry_run_leaves_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.txt");
        fs::write(&path, "x").unwrap();

        let outcome = executor().with_dry_run(true).execute(&path, "y.txt");
        assert!(matches!(outcome, RenameOutcome::Planned(ref plan) if plan.final_name == "y.txt"));
        assert!(path.exists());
        assert!(!dir.path().join("y.txt").exists());
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("file.txt")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/tmp/file.txt")), PathBuf::from("/tmp"));
    }
}
