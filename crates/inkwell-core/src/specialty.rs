// ABOUTME: Defines the closed set of agent specialties used to bind workflows to agents.
// ABOUTME: Provides labels, parsing, and display so specialties round-trip through config and storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The category of creative-writing task an agent performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Theme,
    Outline,
    World,
    Character,
    Relationship,
    Dialogue,
    Plot,
}

impl Specialty {
    /// Every specialty, in the canonical order used for default agent sets.
    pub const ALL: [Specialty; 7] = [
        Specialty::Theme,
        Specialty::Outline,
        Specialty::World,
        Specialty::Character,
        Specialty::Relationship,
        Specialty::Dialogue,
        Specialty::Plot,
    ];

    /// Return the machine label for this specialty.
    pub fn label(&self) -> &'static str {
        match self {
            Specialty::Theme => "theme",
            Specialty::Outline => "outline",
            Specialty::World => "world",
            Specialty::Character => "character",
            Specialty::Relationship => "relationship",
            Specialty::Dialogue => "dialogue",
            Specialty::Plot => "plot",
        }
    }

    /// Human-readable title used for default agent names.
    pub fn title(&self) -> &'static str {
        match self {
            Specialty::Theme => "Theme Analyst",
            Specialty::Outline => "Outline Planner",
            Specialty::World => "World Builder",
            Specialty::Character => "Character Designer",
            Specialty::Relationship => "Relationship Mapper",
            Specialty::Dialogue => "Dialogue Stylist",
            Specialty::Plot => "Plot Reviewer",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a string does not name a known specialty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown specialty: {0}")]
pub struct UnknownSpecialty(pub String);

impl FromStr for Specialty {
    type Err = UnknownSpecialty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Specialty::ALL
            .into_iter()
            .find(|sp| sp.label() == normalized)
            .ok_or_else(|| UnknownSpecialty(s.to_string()))
    }
}
