use chrono::NaiveDateTime;
use tracing::debug;

use crate::config::{ComposeConfig, FallbackMode};
use crate::identity::ResolvedIdentity;
use crate::parser::ParsedName;

/// Builds rename candidates: identity first, then a short context, then the
/// original extension. Raw identifiers never reach the output.
#[derive(Debug, Clone, Default)]
pub struct NameComposer {
    config: ComposeConfig,
}

impl NameComposer {
    pub fn new(config: ComposeConfig) -> Self {
        Self { config }
    }

    pub fn compose(&self, parsed: &ParsedName, identity: &ResolvedIdentity) -> String {
        if !parsed.matched {
            return parsed.original.clone();
        }

        match identity.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                let mut segments = vec![name.to_string()];
                if let Some(ts) = parsed.timestamp_raw.as_deref() {
                    segments.push(self.timestamp_context(ts));
                }
                segments.extend(parsed.tag.iter().cloned());
                segments.extend(parsed.description.iter().cloned());
                let stem = segments
                    .iter()
                    .map(|s| filter_rename_component(s))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(&self.config.separator);
                self.finish(&stem, &parsed.extension)
            }
            _ => match (self.config.fallback, parsed.description.as_deref()) {
                (FallbackMode::StripIdentifiers, Some(description)) => {
                    self.finish(&filter_rename_component(description), &parsed.extension)
                }
                _ => parsed.original.clone(),
            },
        }
    }

    fn timestamp_context(&self, raw: &str) -> String {
        if let Some(format) = self.config.timestamp_format.as_deref() {
            match parse_timestamp(raw) {
                Some(parsed) => return parsed.format(format).to_string(),
                None => debug!(timestamp = raw, "Unparseable timestamp, using raw prefix"),
            }
        }
        raw.chars().take(self.config.timestamp_chars).collect()
    }

    /// Trims the stem and caps the whole name at `max_name_bytes`, never cutting the extension.
    fn finish(&self, stem: &str, extension: &str) -> String {
        let suffix = format!(".{}", extension);
        let budget = self.config.max_name_bytes.saturating_sub(suffix.len());
        let mut stem = stem.trim_end_matches([' ', '.']).to_string();
        if stem.len() > budget {
            let mut cut = budget;
            while !stem.is_char_boundary(cut) {
                cut -= 1;
            }
            stem.truncate(cut);
            stem = stem
                .trim_end_matches(|c: char| c.is_whitespace() || c == '.' || c == '-')
                .to_string();
        }
        stem + &suffix
    }
}

/// Accepts both `hhmmss` and the zero-dropped `hmmss` time portion.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let (date, rest) = raw.split_once('T')?;
    let time = rest.split('-').next()?;
    let time = match time.len() {
        5 => format!("0{}", time),
        6 => time.to_string(),
        _ => return None,
    };
    NaiveDateTime::parse_from_str(&format!("{}T{}", date, time), "%Y%m%dT%H%M%S").ok()
}

/// Makes one name segment safe as a path component.
fn filter_rename_component(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Strict filter for derived output names (e.g. tabular exports): keeps
/// alphanumerics, space, period and underscore, and guarantees the extension.
pub fn sanitize_output_name(name: &str, extension: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_'))
        .collect::<String>()
        .trim_end()
        .to_string();
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    if !sanitized.ends_with(&suffix) {
        sanitized.push_str(&suffix);
    }
    sanitized
}
