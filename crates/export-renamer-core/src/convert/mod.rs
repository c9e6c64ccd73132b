pub mod command;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info};

use crate::config::ConversionConfig;

pub use command::CommandConverter;

pub const TARGET_EXTENSION: &str = "pdf";

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("no conversion engine found")]
    EngineNotFound,

    #[error("conversion disabled")]
    Disabled,

    #[error("failed to start conversion engine: {0}")]
    Spawn(#[source] io::Error),

    #[error("conversion engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("conversion exceeded deadline of {0:?}")]
    TimedOut(Duration),

    #[error("conversion engine produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Renders a source document to a sibling file of the target format.
///
/// Each call owns its working set and releases it on every exit path.
pub trait Converter: Send + Sync {
    fn convert(&self, source: &Path, deadline: Instant) -> Result<PathBuf, ConversionError>;

    /// Releases any engine handles kept between calls.
    fn reclaim(&self) {}
}

/// Same directory and stem, extension replaced.
pub fn target_path(source: &Path) -> PathBuf {
    source.with_extension(TARGET_EXTENSION)
}

/// Converter used when conversion is turned off or no engine is installed.
#[derive(Debug, Default)]
pub struct DisabledConverter;

impl Converter for DisabledConverter {
    fn convert(&self, _source: &Path, _deadline: Instant) -> Result<PathBuf, ConversionError> {
        Err(ConversionError::Disabled)
    }
}

#[derive(Debug)]
pub enum ConversionOutcome {
    /// The renamed file is not of a qualifying format.
    Skipped,
    Triggered(PathBuf),
    /// A target sibling already existed; nothing was rendered.
    AlreadyPresent(PathBuf),
    Failed(ConversionError),
}

/// Fires the converter for a freshly renamed file. Its failures are reported
/// but never undo the rename.
pub struct ConversionTrigger {
    converter: Arc<dyn Converter>,
    config: ConversionConfig,
}

impl ConversionTrigger {
    pub fn new(converter: Arc<dyn Converter>, config: ConversionConfig) -> Self {
        Self { converter, config }
    }

    pub fn qualifies(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.is_convertible(ext))
    }

    pub fn fire(&self, source: &Path) -> ConversionOutcome {
        let target = target_path(source);
        if self.config.skip_existing && target.exists() {
            info!(target = %target.display(), "Converted file already exists, skipping conversion");
            return ConversionOutcome::AlreadyPresent(target);
        }

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        match self.converter.convert(source, deadline) {
            Ok(output) => {
                info!(source = %source.display(), output = %output.display(), "Converted file");
                ConversionOutcome::Triggered(output)
            }
            Err(err) => {
                error!(source = %source.display(), "Failed to convert file: {}", err);
                ConversionOutcome::Failed(err)
            }
        }
    }

    pub fn reclaim(&self) {
        self.converter.reclaim();
    }
}
