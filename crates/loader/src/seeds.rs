//! Seed record shapes and the catalogs compiled into the binary.

use chrono::NaiveDate;
use core_types::{ConservationStatus, NewCall, NewProject, NewSpecies, ProjectStatus};
use serde::Deserialize;
use std::fmt::Write as _;

pub const DEFAULT_SPECIES: &str = include_str!("../data/species.json");
pub const DEFAULT_CALLS: &str = include_str!("../data/calls.json");
pub const DEFAULT_PROJECTS: &str = include_str!("../data/projects.json");

#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesSeed {
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

impl SpeciesSeed {
    /// Fills in missing descriptions before the record is inserted.
    pub fn into_new_species(self) -> NewSpecies {
        let description = self.description.clone().or_else(|| Some(compose_description(&self)));
        let vocalization_description = self
            .vocalization_description
            .clone()
            .or_else(|| Some(vocalization_for(&self.name).to_string()));

        NewSpecies {
            name: self.name,
            scientific_name: self.scientific_name,
            description,
            habitat: self.habitat,
            region: self.region,
            conservation_status: self.conservation_status,
            image_url: self.image_url,
            size_cm: self.size_cm,
            lifespan_years: self.lifespan_years,
            diet: self.diet,
            color: self.color,
            vocalization_description,
            vocalization_url: self.vocalization_url,
        }
    }
}

/// A call seed names its species rather than carrying an id, since ids are
/// only known once the species have been loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct CallSeed {
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub species_name: Option<String>,
    pub audio_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recorded_by: Option<String>,
    #[serde(default)]
    pub recording_date: Option<NaiveDate>,
}

impl CallSeed {
    pub fn into_new_call(self, species_id: i64) -> NewCall {
        NewCall {
            species_id,
            audio_url: self.audio_url,
            local_file: false,
            description: self.description,
            recorded_by: self.recorded_by,
            recording_date: self.recording_date,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSeed {
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub species_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_project_status")]
    pub status: ProjectStatus,
}

fn default_project_status() -> ProjectStatus {
    ProjectStatus::Planned
}

impl ProjectSeed {
    pub fn into_new_project(self, species_id: i64) -> NewProject {
        NewProject {
            species_id,
            name: self.name,
            description: self.description,
            organization: self.organization,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
        }
    }
}

/// Builds a short prose description out of whichever fields the seed has.
pub fn compose_description(seed: &SpeciesSeed) -> String {
    let mut text = format!("{} ({}) is", seed.name, seed.scientific_name);
    match &seed.color {
        Some(color) => {
            let _ = write!(text, " {} {} frog", article(color), color);
        }
        None => text.push_str(" a frog"),
    }
    match (&seed.habitat, &seed.region) {
        (Some(habitat), Some(region)) => {
            let _ = write!(text, " found in {} habitats of {}", habitat.to_lowercase(), region);
        }
        (Some(habitat), None) => {
            let _ = write!(text, " found in {} habitats", habitat.to_lowercase());
        }
        (None, Some(region)) => {
            let _ = write!(text, " found in {}", region);
        }
        (None, None) => {}
    }
    text.push('.');

    match (seed.size_cm, seed.lifespan_years) {
        (Some(size), Some(years)) => {
            let _ = write!(text, " It grows to approximately {} cm and can live up to {} years.", size, years);
        }
        (Some(size), None) => {
            let _ = write!(text, " It grows to approximately {} cm.", size);
        }
        (None, Some(years)) => {
            let _ = write!(text, " It can live up to {} years.", years);
        }
        (None, None) => {}
    }
    if let Some(diet) = &seed.diet {
        let _ = write!(text, " Its diet consists primarily of {}.", diet);
    }
    let _ = write!(
        text,
        " The conservation status is currently listed as {}.",
        seed.conservation_status
    );
    text
}

fn article(word: &str) -> &'static str {
    match word.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// A generic description of how a species sounds, chosen by family name.
pub fn vocalization_for(common_name: &str) -> &'static str {
    let name = common_name.to_lowercase();
    if name.contains("tree frog") || name.contains("treefrog") {
        "Melodic calls, often heard after rain"
    } else if name.contains("bullfrog") {
        "Deep, resonant 'jug-o-rum' calls"
    } else if name.contains("poison") {
        "Soft, buzzing calls"
    } else {
        "Typical croaking sounds"
    }
}
