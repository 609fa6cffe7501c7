//! Street-name normalization and road matching.
//!
//! The driver's street name (from reverse geocoding, in the device locale)
//! is compared against the trap's free-text address (in the dataset's
//! language). Matching is deliberately loose: containment in either
//! direction after normalization, or a shared route number on a highway.

/// Street values a location provider reports before a real name is known.
const UNRESOLVED_STREET_NAMES: &[&str] = &[
    "Finding your location...",
    "Searching for location...",
    "Unknown Street",
    "Unnamed Road",
    "Location unavailable",
];

/// Full words mapped to the abbreviation they are compared as.
const SYNONYMS: &[(&str, &str)] = &[
    ("road", "rd"),
    ("street", "st"),
    ("highway", "hwy"),
    ("avenue", "ave"),
    ("boulevard", "blvd"),
    ("drive", "dr"),
    ("lane", "ln"),
    ("freeway", "fwy"),
    ("expressway", "expy"),
    ("route", "rte"),
    ("national", "natl"),
];

/// Tokens (after normalization) that mark a numbered highway.
const HIGHWAY_TOKENS: &[&str] = &["hwy", "fwy", "expy", "rte", "interstate", "i", "us", "sr"];

/// Highway markers in CJK addresses, matched as substrings.
const HIGHWAY_MARKERS: &[&str] = &["國道", "省道", "快速", "公路"];

/// Whether a street value carries no usable road name.
pub fn is_unresolved_street(name: &str) -> bool {
    let name = name.trim();
    name.chars().count() < 2
        || UNRESOLVED_STREET_NAMES
            .iter()
            .any(|placeholder| placeholder.eq_ignore_ascii_case(name))
}

/// Lower-case, replace punctuation with spaces, collapse whitespace and
/// abbreviate common road words.
///
/// ```
/// use trap_matcher::scoring::road::normalize_road_name;
/// assert_eq!(normalize_road_name("Main Street"), "main st");
/// assert_eq!(normalize_road_name("Pacific  Coast Highway-1"), "pacific coast hwy 1");
/// ```
pub fn normalize_road_name(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    lowered
        .split_whitespace()
        .map(|token| {
            SYNONYMS
                .iter()
                .find(|(full, _)| *full == token)
                .map(|(_, short)| *short)
                .unwrap_or(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First run of ASCII digits in `text`, as a number.
fn first_number(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn mentions_highway(normalized: &str) -> bool {
    normalized
        .split_whitespace()
        .any(|token| HIGHWAY_TOKENS.contains(&token))
        || HIGHWAY_MARKERS.iter().any(|m| normalized.contains(m))
}

/// Whether the driver's street and a trap address describe the same road.
///
/// Callers are expected to have filtered unresolved street names already;
/// this function treats them as ordinary text.
pub fn roads_match(street_name: &str, trap_address: &str) -> bool {
    let street = normalize_road_name(street_name);
    let address = normalize_road_name(trap_address);
    if street.is_empty() || address.is_empty() {
        return false;
    }

    if address.contains(&street) || street.contains(&address) {
        return true;
    }

    // "National Highway 1" vs "國道1號": same route number on a highway
    match (first_number(&street), first_number(&address)) {
        (Some(a), Some(b)) => a == b && mentions_highway(&street),
        _ => false,
    }
}
