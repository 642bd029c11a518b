use crate::connection::ConnectionProvider;
use crate::error::{DbError, ValidationError};
use crate::executor::{self, ExecuteOutcome, ResultRow, Statement, TabularResult};
use chrono::Utc;
use core_types::{
    CatalogCall, Call, ConservationProject, ConservationStatus, NewCall, NewProject, NewSighting, NewSpecies,
    ProjectStatus, Sighting, Species,
};

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL and the mapping from raw rows to
/// typed records.
///
/// Every method is exactly one statement and one round trip on its own
/// connection. Nothing is cached and nothing is batched.
#[derive(Debug, Clone)]
pub struct DbRepository {
    provider: ConnectionProvider,
}

impl DbRepository {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    async fn run(&self, statement: Statement) -> Result<ExecuteOutcome, DbError> {
        self.provider
            .with_connection(move |conn| Box::pin(async move { executor::execute(conn, &statement).await }))
            .await
    }

    async fn fetch(&self, statement: Statement) -> Result<TabularResult, DbError> {
        Ok(self.run(statement).await?.into_rows())
    }

    async fn fetch_optional<T>(
        &self,
        statement: Statement,
        map: fn(&ResultRow) -> Result<T, DbError>,
    ) -> Result<Option<T>, DbError> {
        let result = self.fetch(statement).await?;
        result.rows.first().map(map).transpose()
    }

    async fn fetch_all<T>(&self, statement: Statement, map: fn(&ResultRow) -> Result<T, DbError>) -> Result<Vec<T>, DbError> {
        let result = self.fetch(statement).await?;
        result.rows.iter().map(map).collect()
    }

    async fn count(&self, statement: Statement) -> Result<i64, DbError> {
        let result = self.fetch(statement).await?;
        match result.rows.first() {
            Some(row) => row.get_i64("total"),
            None => Ok(0),
        }
    }

    /// Runs an insert, turning a foreign-key violation into `UnknownSpecies`.
    async fn insert_for_species(&self, species_id: i64, statement: Statement) -> Result<i64, DbError> {
        let outcome = self.run(statement).await.map_err(|e| match e {
            DbError::Validation(ValidationError::ForeignKey(_)) => {
                DbError::Validation(ValidationError::UnknownSpecies(species_id))
            }
            other => other,
        })?;
        outcome
            .identity()
            .ok_or_else(|| DbError::decode("identity", "insert returned no identity"))
    }

    // ==========================================================================
    // Species
    // ==========================================================================

    /// Fetches all species, ordered by id.
    pub async fn list_species(&self) -> Result<Vec<Species>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT species_id, name, scientific_name, description, habitat, region,
                       conservation_status, image_url, size_cm, lifespan_years, diet, color,
                       vocalization_description, vocalization_url, created_at
                FROM frog_species
                ORDER BY species_id ASC
                "#,
            ),
            species_from_row,
        )
        .await
    }

    /// Fetches one species; `None` if the id does not exist.
    pub async fn get_species(&self, species_id: i64) -> Result<Option<Species>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT species_id, name, scientific_name, description, habitat, region,
                       conservation_status, image_url, size_cm, lifespan_years, diet, color,
                       vocalization_description, vocalization_url, created_at
                FROM frog_species
                WHERE species_id = $1
                "#,
            )
            .bind(species_id),
            species_from_row,
        )
        .await
    }

    /// Case-insensitive lookup by scientific name, the natural key of a species.
    pub async fn find_species_by_scientific_name(&self, scientific_name: &str) -> Result<Option<Species>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT species_id, name, scientific_name, description, habitat, region,
                       conservation_status, image_url, size_cm, lifespan_years, diet, color,
                       vocalization_description, vocalization_url, created_at
                FROM frog_species
                WHERE LOWER(scientific_name) = LOWER($1)
                ORDER BY species_id ASC
                LIMIT 1
                "#,
            )
            .bind(scientific_name.trim()),
            species_from_row,
        )
        .await
    }

    /// Case-insensitive lookup by common name. Common names are not unique;
    /// the lowest id wins.
    pub async fn find_species_by_name(&self, name: &str) -> Result<Option<Species>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT species_id, name, scientific_name, description, habitat, region,
                       conservation_status, image_url, size_cm, lifespan_years, diet, color,
                       vocalization_description, vocalization_url, created_at
                FROM frog_species
                WHERE LOWER(name) = LOWER($1)
                ORDER BY species_id ASC
                LIMIT 1
                "#,
            )
            .bind(name.trim()),
            species_from_row,
        )
        .await
    }

    /// Substring search over common and scientific names.
    pub async fn search_species(&self, term: &str) -> Result<Vec<Species>, DbError> {
        let pattern = format!("%{}%", escape_like(&term.trim().to_lowercase()));
        self.fetch_all(
            Statement::read(
                r#"
                SELECT species_id, name, scientific_name, description, habitat, region,
                       conservation_status, image_url, size_cm, lifespan_years, diet, color,
                       vocalization_description, vocalization_url, created_at
                FROM frog_species
                WHERE LOWER(name) LIKE $1 ESCAPE '\'
                   OR LOWER(scientific_name) LIKE $1 ESCAPE '\'
                ORDER BY species_id ASC
                "#,
            )
            .bind(pattern),
            species_from_row,
        )
        .await
    }

    pub async fn insert_species(&self, species: &NewSpecies) -> Result<i64, DbError> {
        require_text("name", &species.name)?;
        require_text("scientific_name", &species.scientific_name)?;

        let statement = Statement::insert(
            r#"
            INSERT INTO frog_species (
                name, scientific_name, description, habitat, region, conservation_status,
                image_url, size_cm, lifespan_years, diet, color, vocalization_description,
                vocalization_url, created_at
            ) VALUES (
                $1, $2, CAST($3 AS TEXT), CAST($4 AS TEXT), CAST($5 AS TEXT), $6,
                CAST($7 AS TEXT), CAST($8 AS DOUBLE PRECISION), CAST($9 AS DOUBLE PRECISION),
                CAST($10 AS TEXT), CAST($11 AS TEXT), CAST($12 AS TEXT), CAST($13 AS TEXT), $14
            )
            RETURNING species_id
            "#,
            "species_id",
        )
        .bind(species.name.trim())
        .bind(species.scientific_name.trim())
        .bind(species.description.as_deref())
        .bind(species.habitat.as_deref())
        .bind(species.region.as_deref())
        .bind(species.conservation_status.label())
        .bind(species.image_url.as_deref())
        .bind(species.size_cm)
        .bind(species.lifespan_years)
        .bind(species.diet.as_deref())
        .bind(species.color.as_deref())
        .bind(species.vocalization_description.as_deref())
        .bind(species.vocalization_url.as_deref())
        .bind(Utc::now());

        let species_id = self
            .run(statement)
            .await?
            .identity()
            .ok_or_else(|| DbError::decode("species_id", "insert returned no identity"))?;
        tracing::debug!(species_id, scientific_name = %species.scientific_name, "Inserted species.");
        Ok(species_id)
    }

    pub async fn count_species(&self) -> Result<i64, DbError> {
        self.count(Statement::read("SELECT COUNT(*) AS total FROM frog_species"))
            .await
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Fetches all calls, ordered by id.
    pub async fn list_calls(&self) -> Result<Vec<Call>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT call_id, species_id, audio_url, local_file, description, recorded_by,
                       recording_date, created_at
                FROM frog_calls
                ORDER BY call_id ASC
                "#,
            ),
            call_from_row,
        )
        .await
    }

    pub async fn get_call(&self, call_id: i64) -> Result<Option<Call>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT call_id, species_id, audio_url, local_file, description, recorded_by,
                       recording_date, created_at
                FROM frog_calls
                WHERE call_id = $1
                "#,
            )
            .bind(call_id),
            call_from_row,
        )
        .await
    }

    /// Fetches the calls of one species, oldest first.
    pub async fn list_calls_for_species(&self, species_id: i64) -> Result<Vec<Call>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT call_id, species_id, audio_url, local_file, description, recorded_by,
                       recording_date, created_at
                FROM frog_calls
                WHERE species_id = $1
                ORDER BY created_at ASC, call_id ASC
                "#,
            )
            .bind(species_id),
            call_from_row,
        )
        .await
    }

    /// Looks a call up by its natural key, `(species_id, audio_url)`.
    pub async fn find_call_by_reference(&self, species_id: i64, audio_url: &str) -> Result<Option<Call>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT call_id, species_id, audio_url, local_file, description, recorded_by,
                       recording_date, created_at
                FROM frog_calls
                WHERE species_id = $1 AND audio_url = $2
                ORDER BY call_id ASC
                LIMIT 1
                "#,
            )
            .bind(species_id)
            .bind(audio_url),
            call_from_row,
        )
        .await
    }

    /// All calls joined with their species' names, ordered by call id.
    pub async fn list_calls_with_species(&self) -> Result<Vec<CatalogCall>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT fc.call_id, fc.species_id, fc.audio_url, fc.local_file, fc.description,
                       fc.recorded_by, fc.recording_date, fc.created_at,
                       fs.name AS species_name, fs.scientific_name
                FROM frog_calls fc
                JOIN frog_species fs ON fc.species_id = fs.species_id
                ORDER BY fc.call_id ASC
                "#,
            ),
            |row| {
                Ok(CatalogCall {
                    call: call_from_row(row)?,
                    species_name: row.get_str("species_name")?.to_string(),
                    scientific_name: row.get_str("scientific_name")?.to_string(),
                })
            },
        )
        .await
    }

    /// Inserts a call and returns its new id.
    ///
    /// Fails with `Validation(UnknownSpecies)` when the species does not exist;
    /// the table is left unchanged in that case.
    pub async fn insert_call(&self, call: &NewCall) -> Result<i64, DbError> {
        require_species_id(call.species_id)?;
        require_text("audio_url", &call.audio_url)?;

        let statement = Statement::insert(
            r#"
            INSERT INTO frog_calls (
                species_id, audio_url, local_file, description, recorded_by, recording_date, created_at
            ) VALUES ($1, $2, $3, CAST($4 AS TEXT), CAST($5 AS TEXT), CAST($6 AS TEXT), $7)
            RETURNING call_id
            "#,
            "call_id",
        )
        .bind(call.species_id)
        .bind(call.audio_url.trim())
        .bind(call.local_file)
        .bind(call.description.as_deref())
        .bind(call.recorded_by.as_deref())
        .bind(call.recording_date)
        .bind(call.created_at.unwrap_or_else(Utc::now));

        let call_id = self.insert_for_species(call.species_id, statement).await?;
        tracing::debug!(call_id, species_id = call.species_id, local = call.local_file, "Inserted call.");
        Ok(call_id)
    }

    pub async fn count_calls(&self) -> Result<i64, DbError> {
        self.count(Statement::read("SELECT COUNT(*) AS total FROM frog_calls"))
            .await
    }

    // ==========================================================================
    // Sightings
    // ==========================================================================

    pub async fn list_sightings(&self) -> Result<Vec<Sighting>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT sighting_id, species_id, location, sighted_at, observer_name, notes,
                       image_url, created_at
                FROM frog_sightings
                ORDER BY sighting_id ASC
                "#,
            ),
            sighting_from_row,
        )
        .await
    }

    pub async fn get_sighting(&self, sighting_id: i64) -> Result<Option<Sighting>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT sighting_id, species_id, location, sighted_at, observer_name, notes,
                       image_url, created_at
                FROM frog_sightings
                WHERE sighting_id = $1
                "#,
            )
            .bind(sighting_id),
            sighting_from_row,
        )
        .await
    }

    /// Sightings of one species in the order they were observed.
    pub async fn list_sightings_for_species(&self, species_id: i64) -> Result<Vec<Sighting>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT sighting_id, species_id, location, sighted_at, observer_name, notes,
                       image_url, created_at
                FROM frog_sightings
                WHERE species_id = $1
                ORDER BY sighted_at ASC, sighting_id ASC
                "#,
            )
            .bind(species_id),
            sighting_from_row,
        )
        .await
    }

    pub async fn insert_sighting(&self, sighting: &NewSighting) -> Result<i64, DbError> {
        require_species_id(sighting.species_id)?;
        require_text("location", &sighting.location)?;

        let statement = Statement::insert(
            r#"
            INSERT INTO frog_sightings (
                species_id, location, sighted_at, observer_name, notes, image_url, created_at
            ) VALUES ($1, $2, $3, CAST($4 AS TEXT), CAST($5 AS TEXT), CAST($6 AS TEXT), $7)
            RETURNING sighting_id
            "#,
            "sighting_id",
        )
        .bind(sighting.species_id)
        .bind(sighting.location.trim())
        .bind(sighting.sighted_at)
        .bind(sighting.observer_name.as_deref())
        .bind(sighting.notes.as_deref())
        .bind(sighting.image_url.as_deref())
        .bind(Utc::now());

        self.insert_for_species(sighting.species_id, statement).await
    }

    // ==========================================================================
    // Conservation projects
    // ==========================================================================

    pub async fn list_projects(&self) -> Result<Vec<ConservationProject>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT project_id, species_id, name, description, organization, start_date,
                       end_date, status, created_at, updated_at
                FROM conservation_projects
                ORDER BY project_id ASC
                "#,
            ),
            project_from_row,
        )
        .await
    }

    pub async fn get_project(&self, project_id: i64) -> Result<Option<ConservationProject>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT project_id, species_id, name, description, organization, start_date,
                       end_date, status, created_at, updated_at
                FROM conservation_projects
                WHERE project_id = $1
                "#,
            )
            .bind(project_id),
            project_from_row,
        )
        .await
    }

    pub async fn list_projects_for_species(&self, species_id: i64) -> Result<Vec<ConservationProject>, DbError> {
        self.fetch_all(
            Statement::read(
                r#"
                SELECT project_id, species_id, name, description, organization, start_date,
                       end_date, status, created_at, updated_at
                FROM conservation_projects
                WHERE species_id = $1
                ORDER BY project_id ASC
                "#,
            )
            .bind(species_id),
            project_from_row,
        )
        .await
    }

    /// Looks a project up by its natural key, `(species_id, name)`.
    pub async fn find_project_by_name(&self, species_id: i64, name: &str) -> Result<Option<ConservationProject>, DbError> {
        self.fetch_optional(
            Statement::read(
                r#"
                SELECT project_id, species_id, name, description, organization, start_date,
                       end_date, status, created_at, updated_at
                FROM conservation_projects
                WHERE species_id = $1 AND LOWER(name) = LOWER($2)
                ORDER BY project_id ASC
                LIMIT 1
                "#,
            )
            .bind(species_id)
            .bind(name.trim()),
            project_from_row,
        )
        .await
    }

    pub async fn insert_project(&self, project: &NewProject) -> Result<i64, DbError> {
        require_species_id(project.species_id)?;
        require_text("name", &project.name)?;
        if let (Some(start), Some(end)) = (project.start_date, project.end_date) {
            if end < start {
                return Err(ValidationError::InvalidField {
                    field: "end_date",
                    reason: format!("{} is before start date {}", end, start),
                }
                .into());
            }
        }

        let now = Utc::now();
        let statement = Statement::insert(
            r#"
            INSERT INTO conservation_projects (
                species_id, name, description, organization, start_date, end_date, status,
                created_at, updated_at
            ) VALUES (
                $1, $2, CAST($3 AS TEXT), CAST($4 AS TEXT), CAST($5 AS TEXT), CAST($6 AS TEXT), $7, $8, $9
            )
            RETURNING project_id
            "#,
            "project_id",
        )
        .bind(project.species_id)
        .bind(project.name.trim())
        .bind(project.description.as_deref())
        .bind(project.organization.as_deref())
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.status.label())
        .bind(now)
        .bind(now);

        self.insert_for_species(project.species_id, statement).await
    }

    /// Moves a project to a new status. Returns `false` if no such project exists.
    pub async fn update_project_status(&self, project_id: i64, status: ProjectStatus) -> Result<bool, DbError> {
        let outcome = self
            .run(
                Statement::write(
                    "UPDATE conservation_projects SET status = $1, updated_at = $2 WHERE project_id = $3",
                )
                .bind(status.label())
                .bind(Utc::now())
                .bind(project_id),
            )
            .await?;
        Ok(outcome.rows_affected() > 0)
    }
}

// ==============================================================================
// Row mapping
// ==============================================================================

fn species_from_row(row: &ResultRow) -> Result<Species, DbError> {
    let status_text = row.get_str("conservation_status")?;
    let conservation_status = status_text
        .parse::<ConservationStatus>()
        .map_err(|e| DbError::decode("conservation_status", e.to_string()))?;

    Ok(Species {
        species_id: row.get_i64("species_id")?,
        name: row.get_str("name")?.to_string(),
        scientific_name: row.get_str("scientific_name")?.to_string(),
        description: row.get_opt_str("description")?,
        habitat: row.get_opt_str("habitat")?,
        region: row.get_opt_str("region")?,
        conservation_status,
        image_url: row.get_opt_str("image_url")?,
        size_cm: row.get_opt_f64("size_cm")?,
        lifespan_years: row.get_opt_f64("lifespan_years")?,
        diet: row.get_opt_str("diet")?,
        color: row.get_opt_str("color")?,
        vocalization_description: row.get_opt_str("vocalization_description")?,
        vocalization_url: row.get_opt_str("vocalization_url")?,
        created_at: row.get_timestamp("created_at")?,
    })
}

fn call_from_row(row: &ResultRow) -> Result<Call, DbError> {
    Ok(Call {
        call_id: row.get_i64("call_id")?,
        species_id: row.get_i64("species_id")?,
        audio_url: row.get_str("audio_url")?.to_string(),
        local_file: row.get_bool("local_file")?,
        description: row.get_opt_str("description")?,
        recorded_by: row.get_opt_str("recorded_by")?,
        recording_date: row.get_opt_date("recording_date")?,
        created_at: row.get_timestamp("created_at")?,
    })
}

fn sighting_from_row(row: &ResultRow) -> Result<Sighting, DbError> {
    Ok(Sighting {
        sighting_id: row.get_i64("sighting_id")?,
        species_id: row.get_i64("species_id")?,
        location: row.get_str("location")?.to_string(),
        sighted_at: row.get_timestamp("sighted_at")?,
        observer_name: row.get_opt_str("observer_name")?,
        notes: row.get_opt_str("notes")?,
        image_url: row.get_opt_str("image_url")?,
        created_at: row.get_timestamp("created_at")?,
    })
}

fn project_from_row(row: &ResultRow) -> Result<ConservationProject, DbError> {
    let status_text = row.get_str("status")?;
    let status = status_text
        .parse::<ProjectStatus>()
        .map_err(|e| DbError::decode("status", e.to_string()))?;

    Ok(ConservationProject {
        project_id: row.get_i64("project_id")?,
        species_id: row.get_i64("species_id")?,
        name: row.get_str("name")?.to_string(),
        description: row.get_opt_str("description")?,
        organization: row.get_opt_str("organization")?,
        start_date: row.get_opt_date("start_date")?,
        end_date: row.get_opt_date("end_date")?,
        status,
        created_at: row.get_timestamp("created_at")?,
        updated_at: row.get_timestamp("updated_at")?,
    })
}

// ==============================================================================
// Validation helpers
// ==============================================================================

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn require_species_id(species_id: i64) -> Result<(), ValidationError> {
    if species_id <= 0 {
        return Err(ValidationError::InvalidField {
            field: "species_id",
            reason: format!("{} is not a valid identity", species_id),
        });
    }
    Ok(())
}

/// Escapes `LIKE` wildcards so user search terms match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
