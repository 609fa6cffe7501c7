//! Trap direction parsing.
//!
//! Datasets describe the enforced direction of travel as free text: Chinese
//! phrases such as "南向北" (south to north) or "東西雙向" (both ways), or
//! English/coded forms such as "Northbound", "SB" or "both directions".

use serde::{Deserialize, Serialize};

use crate::geo_utils::angular_difference;

/// Phrases that mean the camera enforces both directions.
const BIDIRECTIONAL_PHRASES: &[&str] = &[
    "雙向",
    "双向",
    "bidirectional",
    "both directions",
    "both ways",
    "two-way",
    "two way",
    "all directions",
];

/// Chinese travel phrases and the heading they describe.
const CJK_HEADINGS: &[(&str, f64)] = &[
    ("南向北", 0.0),
    ("北向南", 180.0),
    ("西向東", 90.0),
    ("東向西", 270.0),
    ("西向东", 90.0),
    ("东向西", 270.0),
    ("北上", 0.0),
    ("南下", 180.0),
    ("往北", 0.0),
    ("往南", 180.0),
    ("往東", 90.0),
    ("往西", 270.0),
];

/// English words and codes (whole tokens) and the heading they describe.
const ENGLISH_HEADINGS: &[(&str, f64)] = &[
    ("northbound", 0.0),
    ("north", 0.0),
    ("nb", 0.0),
    ("n", 0.0),
    ("southbound", 180.0),
    ("south", 180.0),
    ("sb", 180.0),
    ("s", 180.0),
    ("eastbound", 90.0),
    ("east", 90.0),
    ("eb", 90.0),
    ("e", 90.0),
    ("westbound", 270.0),
    ("west", 270.0),
    ("wb", 270.0),
    ("w", 270.0),
];

/// Canonical reading of a trap's direction text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TravelDirection {
    /// Enforced in both directions; any heading matches
    Bidirectional,
    /// Enforced for traffic travelling toward this compass heading
    Heading(f64),
    /// Missing, unrecognized or contradictory text
    Unknown,
}

impl TravelDirection {
    /// Parse free-text direction.
    ///
    /// ```
    /// use trap_matcher::TravelDirection;
    /// assert_eq!(TravelDirection::parse("北向南"), TravelDirection::Heading(180.0));
    /// assert_eq!(TravelDirection::parse("Eastbound"), TravelDirection::Heading(90.0));
    /// assert_eq!(TravelDirection::parse("東西雙向"), TravelDirection::Bidirectional);
    /// assert_eq!(TravelDirection::parse("順向"), TravelDirection::Unknown);
    /// ```
    pub fn parse(text: &str) -> Self {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return TravelDirection::Unknown;
        }

        if BIDIRECTIONAL_PHRASES.iter().any(|p| lowered.contains(p)) {
            return TravelDirection::Bidirectional;
        }

        let mut found: Option<f64> = None;
        let cjk = CJK_HEADINGS
            .iter()
            .filter(|(phrase, _)| lowered.contains(phrase))
            .map(|(_, heading)| *heading);
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let english = ENGLISH_HEADINGS
            .iter()
            .filter(|(word, _)| tokens.contains(word))
            .map(|(_, heading)| *heading);

        for heading in cjk.chain(english) {
            match found {
                None => found = Some(heading),
                Some(existing) if existing == heading => {}
                // "north to south" and similar are ambiguous without road geometry
                Some(_) => return TravelDirection::Unknown,
            }
        }

        found.map_or(TravelDirection::Unknown, TravelDirection::Heading)
    }

    /// Whether a vehicle heading agrees with this direction.
    ///
    /// `None` when the direction is unknown and no judgement can be made.
    pub fn agrees_with(&self, heading: f64, tolerance_degrees: f64) -> Option<bool> {
        match self {
            TravelDirection::Bidirectional => Some(true),
            TravelDirection::Heading(target) => {
                Some(angular_difference(heading, *target) <= tolerance_degrees)
            }
            TravelDirection::Unknown => None,
        }
    }
}
