//! # Froggy Loader Crate
//!
//! Idempotent bulk loads of species, calls and conservation projects from
//! JSON seed catalogs.
//!
//! Every record is keyed by its natural key and looked up before it is
//! inserted, so a catalog can be loaded any number of times. A record that
//! cannot be parsed or stored is logged and counted as failed; the rest of
//! the batch still loads. A connection error ends the load immediately.

pub mod error;
pub mod seeds;

pub use error::LoadError;
pub use seeds::{CallSeed, ProjectSeed, SpeciesSeed};

use database::{DbError, DbRepository, ValidationError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Per-batch counts reported by every loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.failed
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} skipped, {} failed",
            self.inserted, self.skipped, self.failed
        )
    }
}

/// The result of loading all three catalogs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub species: LoadSummary,
    pub calls: LoadSummary,
    pub projects: LoadSummary,
}

/// Catalog sources for [`seed_all`]. `None` selects the bundled catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSources<'a> {
    pub species: Option<&'a Path>,
    pub calls: Option<&'a Path>,
    pub projects: Option<&'a Path>,
}

enum Outcome {
    Inserted,
    Skipped,
}

/// Splits a catalog into raw records. Records are decoded one at a time later,
/// so one bad record does not reject the whole file.
pub fn parse_catalog(text: &str) -> Result<Vec<Value>, LoadError> {
    Ok(serde_json::from_str::<Vec<Value>>(text)?)
}

pub fn read_catalog(path: &Path) -> Result<Vec<Value>, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&text)
}

fn catalog_or_default(path: Option<&Path>, bundled: &str) -> Result<Vec<Value>, LoadError> {
    match path {
        Some(path) => read_catalog(path),
        None => parse_catalog(bundled),
    }
}

/// Loads species, then calls, then projects. Later catalogs resolve their
/// species by name, so the order matters.
pub async fn seed_all(repo: &DbRepository, sources: SeedSources<'_>) -> Result<SeedReport, LoadError> {
    let species = catalog_or_default(sources.species, seeds::DEFAULT_SPECIES)?;
    let calls = catalog_or_default(sources.calls, seeds::DEFAULT_CALLS)?;
    let projects = catalog_or_default(sources.projects, seeds::DEFAULT_PROJECTS)?;

    Ok(SeedReport {
        species: load_species(repo, &species).await?,
        calls: load_calls(repo, &calls).await?,
        projects: load_projects(repo, &projects).await?,
    })
}

/// Inserts every species whose scientific name is not yet present.
pub async fn load_species(repo: &DbRepository, records: &[Value]) -> Result<LoadSummary, DbError> {
    let mut summary = LoadSummary::default();
    for (index, record) in records.iter().enumerate() {
        let Some(seed) = decode::<SpeciesSeed>("species", index, record, &mut summary) else {
            continue;
        };
        let label = seed.scientific_name.clone();
        let result = load_one_species(repo, seed).await;
        tally("species", &label, result, &mut summary)?;
    }
    tracing::info!(%summary, "Species load finished.");
    Ok(summary)
}

async fn load_one_species(repo: &DbRepository, seed: SpeciesSeed) -> Result<Outcome, DbError> {
    if repo.find_species_by_scientific_name(&seed.scientific_name).await?.is_some() {
        return Ok(Outcome::Skipped);
    }
    repo.insert_species(&seed.into_new_species()).await?;
    Ok(Outcome::Inserted)
}

/// Inserts every call whose `(species, audio_url)` pair is not yet present.
pub async fn load_calls(repo: &DbRepository, records: &[Value]) -> Result<LoadSummary, DbError> {
    let mut summary = LoadSummary::default();
    for (index, record) in records.iter().enumerate() {
        let Some(seed) = decode::<CallSeed>("call", index, record, &mut summary) else {
            continue;
        };
        let label = seed.audio_url.clone();
        let result = load_one_call(repo, seed).await;
        tally("call", &label, result, &mut summary)?;
    }
    tracing::info!(%summary, "Call load finished.");
    Ok(summary)
}

async fn load_one_call(repo: &DbRepository, seed: CallSeed) -> Result<Outcome, DbError> {
    let species_id = resolve_species(repo, seed.scientific_name.as_deref(), seed.species_name.as_deref()).await?;
    if repo.find_call_by_reference(species_id, seed.audio_url.trim()).await?.is_some() {
        return Ok(Outcome::Skipped);
    }
    repo.insert_call(&seed.into_new_call(species_id)).await?;
    Ok(Outcome::Inserted)
}

/// Inserts every project whose `(species, name)` pair is not yet present.
pub async fn load_projects(repo: &DbRepository, records: &[Value]) -> Result<LoadSummary, DbError> {
    let mut summary = LoadSummary::default();
    for (index, record) in records.iter().enumerate() {
        let Some(seed) = decode::<ProjectSeed>("project", index, record, &mut summary) else {
            continue;
        };
        let label = seed.name.clone();
        let result = load_one_project(repo, seed).await;
        tally("project", &label, result, &mut summary)?;
    }
    tracing::info!(%summary, "Project load finished.");
    Ok(summary)
}

async fn load_one_project(repo: &DbRepository, seed: ProjectSeed) -> Result<Outcome, DbError> {
    let species_id = resolve_species(repo, seed.scientific_name.as_deref(), seed.species_name.as_deref()).await?;
    if repo.find_project_by_name(species_id, &seed.name).await?.is_some() {
        return Ok(Outcome::Skipped);
    }
    repo.insert_project(&seed.into_new_project(species_id)).await?;
    Ok(Outcome::Inserted)
}

/// Scientific name first, then the common name.
async fn resolve_species(
    repo: &DbRepository,
    scientific_name: Option<&str>,
    common_name: Option<&str>,
) -> Result<i64, DbError> {
    if let Some(name) = scientific_name.filter(|n| !n.trim().is_empty()) {
        if let Some(species) = repo.find_species_by_scientific_name(name).await? {
            return Ok(species.species_id);
        }
    }
    if let Some(name) = common_name.filter(|n| !n.trim().is_empty()) {
        if let Some(species) = repo.find_species_by_name(name).await? {
            return Ok(species.species_id);
        }
    }

    let wanted = scientific_name.or(common_name).unwrap_or_default();
    Err(ValidationError::InvalidField {
        field: "species",
        reason: format!("no species named '{}'", wanted),
    }
    .into())
}

fn decode<T: DeserializeOwned>(kind: &str, index: usize, record: &Value, summary: &mut LoadSummary) -> Option<T> {
    match serde_json::from_value::<T>(record.clone()) {
        Ok(seed) => Some(seed),
        Err(e) => {
            tracing::warn!(kind, index, error = %e, "Skipping malformed seed record.");
            summary.failed += 1;
            None
        }
    }
}

/// Counts one record's outcome. Only a connection error is passed back up.
fn tally(kind: &str, label: &str, result: Result<Outcome, DbError>, summary: &mut LoadSummary) -> Result<(), DbError> {
    match result {
        Ok(Outcome::Inserted) => {
            tracing::debug!(kind, record = label, "Inserted seed record.");
            summary.inserted += 1;
        }
        Ok(Outcome::Skipped) => {
            tracing::debug!(kind, record = label, "Seed record already present.");
            summary.skipped += 1;
        }
        Err(e) if e.is_connection() => return Err(e),
        Err(e) => {
            tracing::warn!(kind, record = label, error = %e, "Failed to load seed record.");
            summary.failed += 1;
        }
    }
    Ok(())
}
