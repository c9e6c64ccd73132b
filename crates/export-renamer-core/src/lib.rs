pub mod catalog;
pub mod collision;
pub mod compose;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod executor;
pub mod identity;
pub mod parser;
pub mod progress;
pub mod scanner;

pub use config::AppConfig;
pub use engine::{BatchInput, BatchResult, RenameEngine};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
