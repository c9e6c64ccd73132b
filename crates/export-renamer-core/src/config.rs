use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_NAME: &str = "Config";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub compose: ComposeConfig,
    pub conversion: ConversionConfig,
    pub batch: BatchConfig,
}

/// Connection and query shape of the identity lookup store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Falls back to `DATABASE_URL` when unset.
    pub database_url: Option<String>,
    pub table: String,
    pub id_column: String,
    pub name_column: String,
    pub pool_max_size: u32,
    pub connection_timeout_secs: u64,
    pub statement_timeout_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            table: "apprentice_info".to_string(),
            id_column: "applicationid".to_string(),
            name_column: "learner_full_name".to_string(),
            pool_max_size: 50,
            connection_timeout_secs: 5,
            statement_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Keep the file name untouched when no identity is resolved.
    Original,
    /// Drop identifiers and timestamp, keeping `description.ext`.
    StripIdentifiers,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComposeConfig {
    pub timestamp_chars: usize,
    /// chrono format string, e.g. `%Y-%m-%d`. Overrides `timestamp_chars` when set.
    pub timestamp_format: Option<String>,
    pub fallback: FallbackMode,
    pub separator: String,
    pub max_name_bytes: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            timestamp_chars: 8,
            timestamp_format: None,
            fallback: FallbackMode::Original,
            separator: " - ".to_string(),
            max_name_bytes: 255,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub enabled: bool,
    pub extensions: Vec<String>,
    /// Program used to render; discovered on PATH when unset.
    pub engine: Option<String>,
    /// Argument template. `{input}` and `{output}` are substituted per call.
    pub args: Option<Vec<String>>,
    pub timeout_secs: u64,
    pub skip_existing: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extensions: vec!["html".to_string()],
            engine: None,
            args: None,
            timeout_secs: 120,
            skip_existing: true,
        }
    }
}

impl ConversionConfig {
    pub fn is_convertible(&self, extension: &str) -> bool {
        self.enabled
            && self
                .extensions
                .iter()
                .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    pub reclaim_interval: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            reclaim_interval: 100,
            ignore_patterns: Vec::new(),
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(DEFAULT_CONFIG_NAME)
}

/// Layers `<name>.toml` (optional) under `RENAMER__*` environment variables.
pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("RENAMER")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("conversion.extensions")
                .with_list_parse_key("batch.ignore_patterns")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_when_no_file() {
        let config = load_configuration_from("/nonexistent/renamer-config").unwrap();
        assert_eq!(config.identity.pool_max_size, 50);
        assert_eq!(config.compose.timestamp_chars, 8);
        assert_eq!(config.compose.fallback, FallbackMode::Original);
        assert_eq!(config.batch.workers, 1);
        assert!(config.conversion.is_convertible("html"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renamer.toml");
        fs::write(
            &path,
            "[compose]\ntimestamp_chars = 10\nfallback = \"strip_identifiers\"\n\n[batch]\nworkers = 4\n",
        )
        .unwrap();

        let name = path.with_extension("");
        let config = load_configuration_from(name.to_str().unwrap()).unwrap();
        assert_eq!(config.compose.timestamp_chars, 10);
        assert_eq!(config.compose.fallback, FallbackMode::StripIdentifiers);
        assert_eq!(config.batch.workers, 4);
        assert_eq!(config.batch.reclaim_interval, 100);
        assert_eq!(config.identity.table, "apprentice_info");
    }

    #[test]
    fn test_is_convertible_ignores_case_and_dot() {
        let config = ConversionConfig {
            extensions: vec![".HTML".to_string(), "htm".to_string()],
            ..Default::default()
        };
        assert!(config.is_convertible("html"));
        assert!(config.is_convertible("HTM"));
        assert!(!config.is_convertible("pdf"));

        let disabled = ConversionConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!disabled.is_convertible("html"));
    }
}
