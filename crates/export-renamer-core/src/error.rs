use std::path::PathBuf;
use thiserror::Error;

use crate::identity::ResolveError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Identity service unavailable: {0}")]
    IdentityUnavailable(#[source] ResolveError),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid catalog rule '{rule}': {reason}")]
    Catalog { rule: String, reason: String },

    #[error("{0}")]
    Other(String),
}
