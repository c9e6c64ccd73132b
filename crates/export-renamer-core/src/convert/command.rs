use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::{target_path, ConversionError, Converter};
use crate::config::ConversionConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_BYTES: u64 = 2048;

const BROWSER_EXECUTABLES: [&str; 4] = ["google-chrome", "chromium", "chromium-browser", "chrome"];

/// Headless Chrome/Chromium invocation. `{input}` and `{output}` are replaced per call.
const BROWSER_ARGS: [&str; 5] = [
    "--headless",
    "--disable-gpu",
    "--no-pdf-header-footer",
    "--print-to-pdf={output}",
    "{input}",
];

/// Runs an external program per conversion, bounded by a deadline.
///
/// The program writes to a temporary file in the target directory, which is
/// moved into place only after a successful exit.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self, ConversionError> {
        if !config.enabled {
            return Err(ConversionError::Disabled);
        }
        let program = match config.engine.as_deref() {
            Some(engine) => which::which(engine).unwrap_or_else(|_| PathBuf::from(engine)),
            None => discover_browser()?,
        };
        let args = config
            .args
            .clone()
            .unwrap_or_else(|| BROWSER_ARGS.iter().map(|s| s.to_string()).collect());
        info!(program = %program.display(), "Using conversion engine");
        Ok(Self::new(program, args))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl Converter for CommandConverter {
    fn convert(&self, source: &Path, deadline: Instant) -> Result<PathBuf, ConversionError> {
        let source = source.canonicalize()?;
        let target = target_path(&source);
        let directory = source.parent().unwrap_or_else(|| Path::new("."));

        // Dropped (and deleted) on every early return.
        let scratch = tempfile::Builder::new()
            .prefix(".export-renamer-")
            .suffix(".partial")
            .tempfile_in(directory)?;
        let mut stderr_log = tempfile::tempfile()?;

        let args = self.render_args(&source, scratch.path());
        trace!(program = %self.program.display(), ?args, "Spawning conversion engine");
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_log.try_clone()?))
            .spawn()
            .map_err(ConversionError::Spawn)?;

        let mut child = ChildGuard(child);
        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.0.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                return Err(ConversionError::TimedOut(started.elapsed()));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(ConversionError::Failed {
                status: status.to_string(),
                stderr: read_tail(&mut stderr_log),
            });
        }

        if scratch.as_file().metadata()?.len() == 0 {
            return Err(ConversionError::MissingOutput(target));
        }

        scratch
            .persist_noclobber(&target)
            .map_err(|e| ConversionError::Io(e.error))?;
        debug!(
            target = %target.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion engine finished"
        );
        Ok(target)
    }
}

/// Kills the engine process if it is still running when dropped.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

fn discover_browser() -> Result<PathBuf, ConversionError> {
    for exe in BROWSER_EXECUTABLES {
        if let Ok(path) = which::which(exe) {
            return Ok(path);
        }
    }
    info!("Chrome executable not found in PATH");
    Err(ConversionError::EngineNotFound)
}

fn read_tail(file: &mut File) -> String {
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut buf = String::new();
    if file.seek(SeekFrom::Start(len.saturating_sub(STDERR_TAIL_BYTES))).is_ok() {
        let mut bytes = Vec::new();
        if file.read_to_end(&mut bytes).is_ok() {
            buf = String::from_utf8_lossy(&bytes).trim().to_string();
        }
    }
    buf
}
