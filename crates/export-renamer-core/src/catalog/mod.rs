//! Ordered catalog of file-name grammars produced by the document export service.
//!
//! Rules are tried most-specific-first and the first structural match wins. A
//! looser rule can match a subset of a stricter rule's input, so the order is
//! part of the contract: new producer variants are appended, never inserted.

mod rules;

use regex::{Captures, Regex};

use crate::error::Error;

pub use rules::STANDARD_RULE_NAMES;

/// Capture group names a rule may define. `ext` is mandatory.
pub const SLOT_NAMES: [&str; 6] = ["primary", "secondary", "tag", "ts", "desc", "ext"];

#[derive(Debug, Clone)]
pub struct CatalogRule {
    name: String,
    pattern: Regex,
}

impl CatalogRule {
    pub fn new(name: &str, pattern: &str) -> Result<Self, Error> {
        let pattern = Regex::new(pattern).map_err(|e| Error::Catalog {
            rule: name.to_string(),
            reason: e.to_string(),
        })?;

        let groups: Vec<&str> = pattern.capture_names().flatten().collect();
        if !groups.contains(&"ext") {
            return Err(Error::Catalog {
                rule: name.to_string(),
                reason: "missing required capture group 'ext'".to_string(),
            });
        }
        if let Some(unknown) = groups.iter().find(|g| !SLOT_NAMES.contains(g)) {
            return Err(Error::Catalog {
                rule: name.to_string(),
                reason: format!("unknown capture group '{}'", unknown),
            });
        }

        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    fn slots(&self, file_name: &str) -> Option<Slots> {
        self.pattern.captures(file_name).map(|caps| Slots::from_captures(&caps))
    }
}

/// Raw captured slots of one match, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slots {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub tag: Option<String>,
    pub timestamp: Option<String>,
    pub description: Option<String>,
    pub extension: Option<String>,
}

impl Slots {
    fn from_captures(caps: &Captures) -> Self {
        let get = |slot: &str| {
            caps.name(slot)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            primary: get("primary"),
            secondary: get("secondary"),
            tag: get("tag"),
            timestamp: get("ts"),
            description: get("desc"),
            extension: get("ext"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    rules: Vec<CatalogRule>,
}

impl PatternCatalog {
    /// An empty catalog. Nothing matches until rules are pushed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rules for every known export layout.
    pub fn standard() -> Self {
        Self {
            rules: rules::STANDARD_RULES.clone(),
        }
    }

    /// Appends a rule at the lowest priority.
    pub fn push(&mut self, name: &str, pattern: &str) -> Result<(), Error> {
        self.rules.push(CatalogRule::new(name, pattern)?);
        Ok(())
    }

    pub fn rules(&self) -> &[CatalogRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule, in priority order, whose grammar matches the whole name.
    pub fn first_match(&self, file_name: &str) -> Option<(&CatalogRule, Slots)> {
        self.rules
            .iter()
            .find_map(|rule| rule.slots(file_name).map(|slots| (rule, slots)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_UUID_DESC: &str = "565b17eb-d43e-4249-b99e-b022009bdc5b.3446ad44-92fe-50ac-a659-43ece535e301.20240415T092621-223Z.Portfolio Release 1.docx";

    fn matched_rule(name: &str) -> Option<String> {
        PatternCatalog::standard()
            .first_match(name)
            .map(|(rule, _)| rule.name().to_string())
    }

    #[test]
    fn test_standard_catalog_order() {
        let catalog = PatternCatalog::standard();
        let names: Vec<&str> = catalog.rules().iter().map(|r| r.name()).collect();
        assert_eq!(names, STANDARD_RULE_NAMES.to_vec());
    }

    #[test]
    fn test_strict_rule_wins_over_looser_rules() {
        // The freeform and loose rules accept this input too.
        let catalog = PatternCatalog::standard();
        let later_matches = catalog
            .rules()
            .iter()
            .filter(|r| r.pattern.is_match(TWO_UUID_DESC))
            .count();
        assert!(later_matches > 1);
        assert_eq!(
            matched_rule(TWO_UUID_DESC).as_deref(),
            Some("two_uuid_timestamp_description")
        );
    }

    #[test]
    fn test_slots_extracted() {
        let (_, slots) = PatternCatalog::standard().first_match(TWO_UUID_DESC).unwrap();
        assert_eq!(slots.primary.as_deref(), Some("565b17eb-d43e-4249-b99e-b022009bdc5b"));
        assert_eq!(slots.secondary.as_deref(), Some("3446ad44-92fe-50ac-a659-43ece535e301"));
        assert_eq!(slots.timestamp.as_deref(), Some("20240415T092621-223Z"));
        assert_eq!(slots.description.as_deref(), Some("Portfolio Release 1"));
        assert_eq!(slots.extension.as_deref(), Some("docx"));
        assert_eq!(slots.tag, None);
    }

    #[test]
    fn test_freeform_description_falls_through_to_second_rule() {
        let name = "565b17eb-d43e-4249-b99e-b022009bdc5b.3446ad44-92fe-50ac-a659-43ece535e301.20240415T092621-223Z.Report #3 @ site.pdf";
        assert_eq!(matched_rule(name).as_deref(), Some("two_uuid_timestamp_freeform"));
    }

    #[test]
    fn test_each_layout_hits_its_rule() {
        let cases = [
            (
                "565b17eb-d43e-4249-b99e-b022009bdc5b.3446ad44-92fe-50ac-a659-43ece535e301.20240415T092621-223Z.pdf",
                "two_uuid_timestamp",
            ),
            (
                "565b17eb-d43e-4249-b99e-b022009bdc5b.Other.20240415T092621-223Z.Evidence log.html",
                "uuid_tag_timestamp_description",
            ),
            (
                "565b17eb-d43e-4249-b99e-b022009bdc5b.Snapshot.20240415T092621-223Z.html",
                "uuid_tag_timestamp",
            ),
            (
                "565b17eb-d43e-4249-b99e-b022009bdc5b.20240415T092621-223Z.Week 2 notes.txt",
                "uuid_timestamp_description",
            ),
            (
                "565b17eb-d43e-4249-b99e-b022009bdc5b.20240415T092621-223Z.png",
                "uuid_timestamp",
            ),
            (
                "565b17ebd-43e-4249-b99e-b022009bdc5b.20240415T092621-223Z.Notes.txt",
                "loose_identifiers",
            ),
        ];
        for (name, expected) in cases {
            assert_eq!(matched_rule(name).as_deref(), Some(expected), "{}", name);
        }
    }

    #[test]
    fn test_unmatched_names() {
        for name in ["Jane Doe - 20240415 - Portfolio.docx", "notes.txt", "", "README"] {
            assert_eq!(matched_rule(name), None, "{}", name);
        }
    }

    #[test]
    fn test_push_appends_at_lowest_priority() {
        let mut catalog = PatternCatalog::new();
        assert!(catalog.first_match("abc.txt").is_none());
        catalog.push("any", r"^(?P<desc>.+)\.(?P<ext>[a-z]+)$").unwrap();
        catalog.push("never", r"^(?P<ext>.+)$").unwrap();
        let (rule, slots) = catalog.first_match("abc.txt").unwrap();
        assert_eq!(rule.name(), "any");
        assert_eq!(slots.description.as_deref(), Some("abc"));
    }

    #[test]
    fn test_rule_without_extension_rejected() {
        let err = CatalogRule::new("bad", r"^(?P<primary>.+)$").unwrap_err();
        assert!(matches!(err, Error::Catalog { .. }));
        assert!(CatalogRule::new("bad", r"^(?P<ext>.+)(?P<other>x)$").is_err());
        assert!(CatalogRule::new("bad", r"^(unclosed").is_err());
    }
}
