use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::compose::NameComposer;
use crate::config::AppConfig;
use crate::convert::{ConversionOutcome, ConversionTrigger, Converter};
use crate::error::Error;
use crate::executor::{RenameExecutor, RenameOutcome};
use crate::identity::{IdentityResolver, ResolveError, ResolvedIdentity};
use crate::parser::{FilenameParser, ParsedName};
use crate::progress::ProgressReporter;
use crate::scanner;

/// The three interchangeable ways to hand files to a batch.
#[derive(Debug, Clone)]
pub enum BatchInput {
    File(PathBuf),
    Files(Vec<PathBuf>),
    /// Regular files directly inside the directory; subdirectories are not entered.
    Directory(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped_unchanged: usize,
    pub failed: usize,
    pub planned: usize,
    pub converted: usize,
    pub conversion_failed: usize,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} renamed, {} skipped, {} failed",
            self.attempted, self.succeeded, self.skipped_unchanged, self.failed
        )?;
        if self.planned > 0 {
            write!(f, ", {} planned", self.planned)?;
        }
        if self.converted > 0 || self.conversion_failed > 0 {
            write!(
                f,
                ", {} converted, {} conversions failed",
                self.converted, self.conversion_failed
            )?;
        }
        if self.cancelled {
            write!(f, " (cancelled after {} of {})", self.attempted, self.total)?;
        }
        Ok(())
    }
}

/// Running counts, shared by every worker of a batch.
#[derive(Default)]
struct Tally {
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    skipped_unchanged: AtomicUsize,
    failed: AtomicUsize,
    planned: AtomicUsize,
    converted: AtomicUsize,
    conversion_failed: AtomicUsize,
}

impl Tally {
    /// Returns the number of files accounted for so far, this one included.
    fn record(&self, outcome: &RenameOutcome) -> usize {
        let counter = match outcome {
            RenameOutcome::SkippedUnchanged => &self.skipped_unchanged,
            RenameOutcome::Planned(_) => &self.planned,
            RenameOutcome::Failed { .. } => &self.failed,
            RenameOutcome::Renamed { conversion, .. } => {
                match conversion {
                    ConversionOutcome::Triggered(_) => {
                        self.converted.fetch_add(1, Ordering::Relaxed);
                    }
                    ConversionOutcome::Failed(_) => {
                        self.conversion_failed.fetch_add(1, Ordering::Relaxed);
                    }
                    ConversionOutcome::Skipped | ConversionOutcome::AlreadyPresent(_) => {}
                }
                &self.succeeded
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.attempted.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn finish(&self, total: usize, cancelled: bool, elapsed: Duration) -> BatchResult {
        BatchResult {
            total,
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            skipped_unchanged: self.skipped_unchanged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            planned: self.planned.load(Ordering::Relaxed),
            converted: self.converted.load(Ordering::Relaxed),
            conversion_failed: self.conversion_failed.load(Ordering::Relaxed),
            cancelled,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

/// Drives parse → resolve → compose → rename → convert over a batch of files.
///
/// The resolver and converter are injected once and shared by every file of
/// every batch this engine runs.
pub struct RenameEngine {
    config: AppConfig,
    parser: FilenameParser,
    composer: NameComposer,
    resolver: Arc<dyn IdentityResolver>,
    executor: RenameExecutor,
    cancel_token: Arc<AtomicBool>,
}

impl RenameEngine {
    pub fn new(
        config: AppConfig,
        resolver: Arc<dyn IdentityResolver>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        let trigger = ConversionTrigger::new(converter, config.conversion.clone());
        Self {
            parser: FilenameParser::default(),
            composer: NameComposer::new(config.compose.clone()),
            executor: RenameExecutor::new(trigger)
                .with_max_name_bytes(config.compose.max_name_bytes),
            resolver,
            config,
            cancel_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_parser(mut self, parser: FilenameParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.executor = self.executor.with_dry_run(dry_run);
        self
    }

    /// Setting the token stops the batch before the next file is started.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_token)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn parse(&self, file_name: &str) -> ParsedName {
        self.parser.parse(file_name)
    }

    /// Candidate name for `file_name`, before collision handling.
    pub fn plan_name(&self, file_name: &str) -> String {
        let parsed = self.parser.parse(file_name);
        let identity = if parsed.matched {
            self.resolve(&parsed)
        } else {
            ResolvedIdentity::not_found()
        };
        self.composer.compose(&parsed, &identity)
    }

    /// Runs one file through the pipeline. Never fails; problems are reported
    /// in the returned outcome.
    pub fn process_file(&self, path: &Path) -> RenameOutcome {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                error!(file = %path.display(), "Not a regular file");
                return RenameOutcome::failed(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not a regular file", path.display()),
                ));
            }
            Err(err) => {
                error!(file = %path.display(), "Error reading file: {}", err);
                return RenameOutcome::failed(err);
            }
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(file = %path.display(), "File name is not valid UTF-8, leaving unchanged");
            return RenameOutcome::SkippedUnchanged;
        };

        let candidate = self.plan_name(file_name);
        self.executor.execute(path, &candidate)
    }

    pub fn run(
        &self,
        input: &BatchInput,
        reporter: &dyn ProgressReporter,
    ) -> Result<BatchResult, Error> {
        let started = Instant::now();
        let files = self.collect(input)?;

        if let Err(err) = self.resolver.health_check() {
            error!("Identity service unavailable, no files touched: {}", err);
            return Err(Error::IdentityUnavailable(err));
        }

        info!("Processing {} files...", files.len());
        reporter.on_batch_start(files.len());

        let tally = Tally::default();
        let workers = self.config.batch.workers.max(1);
        if workers == 1 {
            for path in &files {
                if self.is_cancelled() {
                    break;
                }
                self.step(path, &tally, reporter);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| Error::Other(format!("Failed to start worker pool: {}", e)))?;
            debug!(workers, "Processing in parallel");
            pool.install(|| {
                files.par_iter().for_each(|path| {
                    if !self.is_cancelled() {
                        self.step(path, &tally, reporter);
                    }
                })
            });
        }

        let cancelled = self.is_cancelled();
        let result = tally.finish(files.len(), cancelled, started.elapsed());
        if cancelled {
            warn!("Batch cancelled: {}", result);
        } else {
            info!("Batch complete in {:.2}s: {}", result.elapsed_secs, result);
        }
        reporter.on_batch_complete(&result);
        Ok(result)
    }

    fn collect(&self, input: &BatchInput) -> Result<Vec<PathBuf>, Error> {
        match input {
            BatchInput::File(path) => Ok(vec![path.clone()]),
            BatchInput::Files(paths) => Ok(paths.clone()),
            BatchInput::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(Error::NotADirectory(dir.clone()));
                }
                Ok(scanner::list_files(dir, &self.config.batch.ignore_patterns)?)
            }
        }
    }

    fn step(&self, path: &Path, tally: &Tally, reporter: &dyn ProgressReporter) {
        let outcome = self.process_file(path);
        let done = tally.record(&outcome);
        reporter.on_file_complete(path, &outcome);

        let interval = self.config.batch.reclaim_interval;
        if interval > 0 && done % interval == 0 {
            info!(files_done = done, "Releasing held resources");
            self.resolver.reclaim();
            self.executor.trigger().reclaim();
            reporter.on_reclaim(done);
        }
    }

    fn resolve(&self, parsed: &ParsedName) -> ResolvedIdentity {
        let Some(identifier) = parsed.resolvable_identifier() else {
            return ResolvedIdentity::not_found();
        };

        match self.resolver.resolve(identifier) {
            Ok(identity) => {
                if !identity.is_found() {
                    warn!(identifier, file = parsed.original.as_str(), "No identity found");
                }
                identity
            }
            Err(ResolveError::Timeout(limit)) => {
                error!(
                    identifier,
                    "Identity lookup timed out after {:?}, treating as not found", limit
                );
                ResolvedIdentity::not_found()
            }
            Err(ResolveError::PoolExhausted { max_size }) => {
                error!(
                    identifier,
                    max_size, "Identity connection pool exhausted, treating as not found"
                );
                ResolvedIdentity::not_found()
            }
            Err(err) => {
                error!(
                    identifier,
                    "Identity lookup failed, treating as not found: {}", err
                );
                ResolvedIdentity::not_found()
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token.load(Ordering::SeqCst)
    }
}
