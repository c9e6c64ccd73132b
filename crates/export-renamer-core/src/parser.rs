use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{PatternCatalog, Slots};

/// Length of a canonical hyphenated UUID.
pub const IDENTIFIER_LEN: usize = 36;

/// Structured view of one file name. `matched == false` means the parser was
/// transparent and the name must be left alone downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedName {
    pub matched: bool,
    pub rule: Option<String>,
    pub primary_identifier: Option<String>,
    pub secondary_identifier: Option<String>,
    pub tag: Option<String>,
    pub timestamp_raw: Option<String>,
    pub description: Option<String>,
    pub extension: String,
    pub original: String,
}

impl ParsedName {
    pub fn unmatched(file_name: &str) -> Self {
        Self {
            original: file_name.to_string(),
            ..Default::default()
        }
    }

    /// Identifier suitable for a lookup. Only canonical UUIDs qualify.
    pub fn resolvable_identifier(&self) -> Option<&str> {
        self.primary_identifier.as_deref()
    }
}

/// Checks the 8-4-4-4-12 hex layout of a canonical UUID string.
pub fn is_canonical_uuid(value: &str) -> bool {
    if value.len() != IDENTIFIER_LEN {
        return false;
    }
    value.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    })
}

#[derive(Debug, Clone)]
pub struct FilenameParser {
    catalog: PatternCatalog,
}

impl Default for FilenameParser {
    fn default() -> Self {
        Self::new(PatternCatalog::standard())
    }
}

impl FilenameParser {
    pub fn new(catalog: PatternCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn parse(&self, file_name: &str) -> ParsedName {
        let Some((rule, slots)) = self.catalog.first_match(file_name) else {
            info!(file = file_name, "No catalog rule matched, leaving name unchanged");
            return ParsedName::unmatched(file_name);
        };
        debug!(file = file_name, rule = rule.name(), "Catalog rule matched");

        let Slots {
            primary,
            secondary,
            tag,
            timestamp,
            description,
            extension,
        } = slots;

        let Some(extension) = extension else {
            // Rules are validated to capture `ext`, so an empty capture is a broken rule.
            if cfg!(debug_assertions) {
                panic!("rule {} matched without an extension", rule.name());
            }
            warn!(
                file = file_name,
                rule = rule.name(),
                "Rule matched without an extension, treating as unmatched"
            );
            return ParsedName::unmatched(file_name);
        };

        let primary_identifier = primary.filter(|id| {
            let valid = is_canonical_uuid(id);
            if !valid {
                warn!(
                    file = file_name,
                    identifier = id.as_str(),
                    "Malformed identifier in filename, skipping identity lookup"
                );
            }
            valid
        });

        ParsedName {
            matched: true,
            rule: Some(rule.name().to_string()),
            primary_identifier,
            secondary_identifier: secondary,
            tag,
            timestamp_raw: timestamp,
            description: description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            extension,
            original: file_name.to_string(),
        }
    }
}
