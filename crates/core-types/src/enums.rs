use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IUCN Red List category of a species.
///
/// Stored in the database as its display label (e.g. `"Least Concern"`).
/// Parsing is lenient: the label, the snake/kebab-case name and the two-letter
/// IUCN code are all accepted, case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConservationStatus {
    LeastConcern,
    NearThreatened,
    Vulnerable,
    Endangered,
    CriticallyEndangered,
    ExtinctInTheWild,
    Extinct,
    DataDeficient,
}

impl ConservationStatus {
    pub const ALL: [ConservationStatus; 8] = [
        ConservationStatus::LeastConcern,
        ConservationStatus::NearThreatened,
        ConservationStatus::Vulnerable,
        ConservationStatus::Endangered,
        ConservationStatus::CriticallyEndangered,
        ConservationStatus::ExtinctInTheWild,
        ConservationStatus::Extinct,
        ConservationStatus::DataDeficient,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConservationStatus::LeastConcern => "Least Concern",
            ConservationStatus::NearThreatened => "Near Threatened",
            ConservationStatus::Vulnerable => "Vulnerable",
            ConservationStatus::Endangered => "Endangered",
            ConservationStatus::CriticallyEndangered => "Critically Endangered",
            ConservationStatus::ExtinctInTheWild => "Extinct in the Wild",
            ConservationStatus::Extinct => "Extinct",
            ConservationStatus::DataDeficient => "Data Deficient",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConservationStatus::LeastConcern => "LC",
            ConservationStatus::NearThreatened => "NT",
            ConservationStatus::Vulnerable => "VU",
            ConservationStatus::Endangered => "EN",
            ConservationStatus::CriticallyEndangered => "CR",
            ConservationStatus::ExtinctInTheWild => "EW",
            ConservationStatus::Extinct => "EX",
            ConservationStatus::DataDeficient => "DD",
        }
    }

    /// True for the three "threatened" categories (VU, EN, CR).
    pub fn is_threatened(&self) -> bool {
        matches!(
            self,
            ConservationStatus::Vulnerable
                | ConservationStatus::Endangered
                | ConservationStatus::CriticallyEndangered
        )
    }
}

impl fmt::Display for ConservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ConservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|status| normalize(status.label()) == wanted || status.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::InvalidInput("conservation_status".to_string(), s.to_string()))
    }
}

impl TryFrom<String> for ConservationStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConservationStatus> for String {
    fn from(value: ConservationStatus) -> Self {
        value.label().to_string()
    }
}

/// Lifecycle of a conservation project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProjectStatus {
    Planned,
    Active,
    Completed,
    Suspended,
}

impl ProjectStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "Planned",
            ProjectStatus::Active => "Active",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "planned" => Ok(ProjectStatus::Planned),
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "suspended" => Ok(ProjectStatus::Suspended),
            _ => Err(CoreError::InvalidInput("project_status".to_string(), s.to_string())),
        }
    }
}

impl TryFrom<String> for ProjectStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectStatus> for String {
    fn from(value: ProjectStatus) -> Self {
        value.label().to_string()
    }
}

/// Lowercases and collapses `_`, `-` and runs of whitespace into single spaces.
fn normalize(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conservation_status_accepts_labels_codes_and_snake_case() {
        assert_eq!("Least Concern".parse::<ConservationStatus>().unwrap(), ConservationStatus::LeastConcern);
        assert_eq!("critically_endangered".parse::<ConservationStatus>().unwrap(), ConservationStatus::CriticallyEndangered);
        assert_eq!("ew".parse::<ConservationStatus>().unwrap(), ConservationStatus::ExtinctInTheWild);
        assert_eq!(" extinct in the  wild ".parse::<ConservationStatus>().unwrap(), ConservationStatus::ExtinctInTheWild);
        assert!("Mostly Fine".parse::<ConservationStatus>().is_err());
    }

    #[test]
    fn conservation_status_serializes_as_label() {
        let json = serde_json::to_string(&ConservationStatus::NearThreatened).unwrap();
        assert_eq!(json, "\"Near Threatened\"");
        let back: ConservationStatus = serde_json::from_str("\"VU\"").unwrap();
        assert_eq!(back, ConservationStatus::Vulnerable);
        assert!(back.is_threatened());
    }

    #[test]
    fn project_status_round_trips_through_its_label() {
        for status in [ProjectStatus::Planned, ProjectStatus::Active, ProjectStatus::Completed, ProjectStatus::Suspended] {
            assert_eq!(status.label().parse::<ProjectStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<ProjectStatus>().is_err());
    }
}
