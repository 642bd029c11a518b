use crate::enums::{ConservationStatus, ProjectStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A row from the `frog_species` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub species_id: i64,
    pub name: String,
    pub scientific_name: String,
    pub description: Option<String>,
    pub habitat: Option<String>,
    pub region: Option<String>,
    pub conservation_status: ConservationStatus,
    pub image_url: Option<String>,
    pub size_cm: Option<f64>,
    pub lifespan_years: Option<f64>,
    pub diet: Option<String>,
    pub color: Option<String>,
    pub vocalization_description: Option<String>,
    /// A reference recording of the species' call, separate from the call catalog.
    pub vocalization_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to insert a species. The id and `created_at` are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpecies {
    pub name: String,
    pub scientific_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub habitat: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub conservation_status: ConservationStatus,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub size_cm: Option<f64>,
    #[serde(default)]
    pub lifespan_years: Option<f64>,
    #[serde(default)]
    pub diet: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub vocalization_description: Option<String>,
    #[serde(default)]
    pub vocalization_url: Option<String>,
}

/// A row from the `frog_calls` table.
///
/// `audio_url` is either a remote URL or, when `local_file` is set, a path
/// inside the local audio tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub call_id: i64,
    pub species_id: i64,
    pub audio_url: String,
    pub local_file: bool,
    pub description: Option<String>,
    pub recorded_by: Option<String>,
    pub recording_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCall {
    pub species_id: i64,
    pub audio_url: String,
    pub local_file: bool,
    pub description: Option<String>,
    pub recorded_by: Option<String>,
    pub recording_date: Option<NaiveDate>,
    /// Defaults to the time of insertion when `None`.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewCall {
    /// A remote call with only the required fields set.
    pub fn remote(species_id: i64, audio_url: impl Into<String>) -> Self {
        Self {
            species_id,
            audio_url: audio_url.into(),
            local_file: false,
            description: None,
            recorded_by: None,
            recording_date: None,
            created_at: None,
        }
    }

    /// A call backed by a file in the local audio tree.
    pub fn local(species_id: i64, path: impl Into<String>) -> Self {
        Self {
            local_file: true,
            ..Self::remote(species_id, path)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A call joined with the names of the species it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCall {
    pub call: Call,
    pub species_name: String,
    pub scientific_name: String,
}

/// A row from the `frog_sightings` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub sighting_id: i64,
    pub species_id: i64,
    pub location: String,
    pub sighted_at: DateTime<Utc>,
    pub observer_name: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSighting {
    pub species_id: i64,
    pub location: String,
    pub sighted_at: DateTime<Utc>,
    pub observer_name: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
}

/// A row from the `conservation_projects` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationProject {
    pub project_id: i64,
    pub species_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub species_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
}
