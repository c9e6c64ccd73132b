use lazy_static::lazy_static;

use super::CatalogRule;

const UUID: &str = r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";
/// `YYYYMMDDThhmmss-fffZ`; some producers drop the leading zero of the hour.
const TIMESTAMP: &str = r"\d{8}T\d{5,6}-\d{3}Z";
const DESCRIPTION: &str = r"[\w\s\[\]\-().,'&+–!*]+";
const FREEFORM: &str = r".+";
const TAG: &str = r"[A-Za-z0-9]+";
const EXTENSION: &str = r"[A-Za-z0-9]+";

/// Rule names of the standard catalog, in priority order.
pub const STANDARD_RULE_NAMES: [&str; 8] = [
    "two_uuid_timestamp_description",
    "two_uuid_timestamp_freeform",
    "two_uuid_timestamp",
    "uuid_tag_timestamp_description",
    "uuid_tag_timestamp",
    "uuid_timestamp_description",
    "uuid_timestamp",
    "loose_identifiers",
];

lazy_static! {
    pub(super) static ref STANDARD_RULES: Vec<CatalogRule> = standard_patterns()
        .into_iter()
        .map(|(name, pattern)| {
            CatalogRule::new(name, &pattern).unwrap_or_else(|e| panic!("standard rule {name}: {e}"))
        })
        .collect();
}

fn standard_patterns() -> Vec<(&'static str, String)> {
    let [two_desc, two_free, two, tag_desc, tag, one_desc, one, loose] = STANDARD_RULE_NAMES;
    vec![
        (
            two_desc,
            format!(
                r"^(?P<primary>{UUID})\.(?P<secondary>{UUID})\.(?P<ts>{TIMESTAMP})\.(?P<desc>{DESCRIPTION})\.(?P<ext>{EXTENSION})$"
            ),
        ),
        (
            two_free,
            format!(
                r"^(?P<primary>{UUID})\.(?P<secondary>{UUID})\.(?P<ts>{TIMESTAMP})\.(?P<desc>{FREEFORM})\.(?P<ext>{EXTENSION})$"
            ),
        ),
        (
            two,
            format!(
                r"^(?P<primary>{UUID})\.(?P<secondary>{UUID})\.(?P<ts>{TIMESTAMP})\.(?P<ext>{EXTENSION})$"
            ),
        ),
        (
            tag_desc,
            format!(
                r"^(?P<primary>{UUID})\.(?P<tag>{TAG})\.(?P<ts>{TIMESTAMP})\.(?P<desc>{FREEFORM})\.(?P<ext>{EXTENSION})$"
            ),
        ),
        (
            tag,
            format!(r"^(?P<primary>{UUID})\.(?P<tag>{TAG})\.(?P<ts>{TIMESTAMP})\.(?P<ext>{EXTENSION})$"),
        ),
        (
            one_desc,
            format!(
                r"^(?P<primary>{UUID})\.(?P<ts>{TIMESTAMP})\.(?P<desc>{FREEFORM})\.(?P<ext>{EXTENSION})$"
            ),
        ),
        (
            one,
            format!(r"^(?P<primary>{UUID})\.(?P<ts>{TIMESTAMP})\.(?P<ext>{EXTENSION})$"),
        ),
        // Shape-only identifiers; the parser rejects non-canonical ones before lookup.
        (
            loose,
            format!(
                r"^(?P<primary>[0-9a-fA-F-]{{36}})\.(?:(?P<secondary>[0-9a-fA-F-]{{36}})\.)?(?P<ts>[0-9T-]{{18,19}}Z)\.(?:(?P<desc>{FREEFORM})\.)?(?P<ext>{EXTENSION})$"
            ),
        ),
    ]
}
