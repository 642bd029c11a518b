use chrono::{Duration, NaiveDate, TimeZone, Utc};
use configuration::DatabaseSettings;
use core_types::{ConservationStatus, NewCall, NewProject, NewSighting, NewSpecies, ProjectStatus};
use database::{ConnectionProvider, DbError, DbRepository, ValidationError, run_migrations};
use tempfile::TempDir;

/// A migrated SQLite database in its own temporary directory.
async fn setup() -> (TempDir, DbRepository) {
    let dir = tempfile::tempdir().unwrap();
    let settings = DatabaseSettings::sqlite(dir.path().join("froggy.db"));
    let provider = ConnectionProvider::new(&settings).unwrap();
    run_migrations(&provider).await.unwrap();
    (dir, DbRepository::new(provider))
}

fn species(name: &str, scientific_name: &str) -> NewSpecies {
    NewSpecies {
        name: name.to_string(),
        scientific_name: scientific_name.to_string(),
        description: None,
        habitat: Some("Rainforest".to_string()),
        region: Some("Central America".to_string()),
        conservation_status: ConservationStatus::LeastConcern,
        image_url: None,
        size_cm: Some(7.5),
        lifespan_years: None,
        diet: Some("Insects".to_string()),
        color: None,
        vocalization_description: None,
        vocalization_url: None,
    }
}

#[tokio::test]
async fn fetch_by_missing_id_returns_none() {
    let (_dir, repo) = setup().await;

    assert!(repo.get_species(42).await.unwrap().is_none());
    assert!(repo.get_call(42).await.unwrap().is_none());
    assert!(repo.get_sighting(42).await.unwrap().is_none());
    assert!(repo.get_project(42).await.unwrap().is_none());
}

#[tokio::test]
async fn species_round_trip_through_the_table() {
    let (_dir, repo) = setup().await;

    let mut new = species("Red-Eyed Tree Frog", "Agalychnis callidryas");
    new.vocalization_url = Some("https://example.org/reference/red-eyed.mp3".to_string());
    let id = repo.insert_species(&new).await.unwrap();
    let stored = repo.get_species(id).await.unwrap().unwrap();

    assert_eq!(stored.species_id, id);
    assert_eq!(stored.name, "Red-Eyed Tree Frog");
    assert_eq!(stored.conservation_status, ConservationStatus::LeastConcern);
    assert_eq!(stored.size_cm, Some(7.5));
    assert_eq!(stored.lifespan_years, None);
    assert_eq!(stored.description, None);
    assert_eq!(
        stored.vocalization_url.as_deref(),
        Some("https://example.org/reference/red-eyed.mp3")
    );
    assert_eq!(repo.count_species().await.unwrap(), 1);
}

#[tokio::test]
async fn local_file_flag_reads_back_from_every_call_query() {
    let (_dir, repo) = setup().await;
    let species_id = repo.insert_species(&species("Wood Frog", "Lithobates sylvaticus")).await.unwrap();
    let local = repo
        .insert_call(&NewCall::local(species_id, "static/audio/1/wood-frog.mp3"))
        .await
        .unwrap();
    let remote = repo
        .insert_call(&NewCall::remote(species_id, "https://example.org/wood.mp3"))
        .await
        .unwrap();

    assert!(repo.get_call(local).await.unwrap().unwrap().local_file);
    assert!(!repo.get_call(remote).await.unwrap().unwrap().local_file);

    let by_reference = repo
        .find_call_by_reference(species_id, "static/audio/1/wood-frog.mp3")
        .await
        .unwrap()
        .unwrap();
    assert!(by_reference.local_file);

    let flags: Vec<bool> = repo.list_calls().await.unwrap().iter().map(|c| c.local_file).collect();
    assert_eq!(flags, vec![true, false]);
    let catalog = repo.list_calls_with_species().await.unwrap();
    assert_eq!(catalog.iter().filter(|entry| !entry.call.local_file).count(), 1);
}

#[tokio::test]
async fn species_lookups_ignore_case_and_treat_wildcards_literally() {
    let (_dir, repo) = setup().await;
    let bullfrog = repo
        .insert_species(&species("American Bullfrog", "Lithobates catesbeianus"))
        .await
        .unwrap();
    repo.insert_species(&species("Glass Frog", "Hyalinobatrachium fleischmanni"))
        .await
        .unwrap();

    let found = repo
        .find_species_by_scientific_name("LITHOBATES CATESBEIANUS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.species_id, bullfrog);

    let found = repo.find_species_by_name("american bullfrog").await.unwrap().unwrap();
    assert_eq!(found.species_id, bullfrog);

    let hits = repo.search_species("frog").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(repo.search_species("%").await.unwrap().is_empty());
}

#[tokio::test]
async fn insert_call_for_unknown_species_is_rejected_and_changes_nothing() {
    let (_dir, repo) = setup().await;
    let before = repo.count_calls().await.unwrap();

    let err = repo
        .insert_call(&NewCall::remote(999, "https://example.org/call.mp3"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Validation(ValidationError::UnknownSpecies(999))));
    assert_eq!(repo.count_calls().await.unwrap(), before);
}

#[tokio::test]
async fn insert_call_validates_before_touching_the_database() {
    let (_dir, repo) = setup().await;
    let species_id = repo.insert_species(&species("Cane Toad", "Rhinella marina")).await.unwrap();

    let err = repo.insert_call(&NewCall::remote(species_id, "  ")).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(ValidationError::MissingField("audio_url"))));

    let err = repo.insert_call(&NewCall::remote(0, "https://example.org/a.mp3")).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Validation(ValidationError::InvalidField { field: "species_id", .. })
    ));
    assert_eq!(repo.count_calls().await.unwrap(), 0);
}

#[tokio::test]
async fn calls_for_species_are_filtered_and_ordered_by_creation_time() {
    let (_dir, repo) = setup().await;
    let a = repo.insert_species(&species("Pacific Tree Frog", "Pseudacris regilla")).await.unwrap();
    let b = repo.insert_species(&species("Wood Frog", "Lithobates sylvaticus")).await.unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();

    // Inserted out of order on purpose.
    let late = repo
        .insert_call(&NewCall::remote(a, "https://example.org/a-late.mp3").created_at(t0 + Duration::hours(2)))
        .await
        .unwrap();
    repo.insert_call(&NewCall::remote(b, "https://example.org/b.mp3").created_at(t0))
        .await
        .unwrap();
    let early = repo
        .insert_call(
            &NewCall::local(a, "static/audio/1/pacific-tree-frog.mp3")
                .with_description("Chorus at dusk")
                .created_at(t0),
        )
        .await
        .unwrap();

    let calls = repo.list_calls_for_species(a).await.unwrap();
    let ids: Vec<i64> = calls.iter().map(|c| c.call_id).collect();
    assert_eq!(ids, vec![early, late]);
    assert!(calls.iter().all(|c| c.species_id == a));
    assert!(calls[0].local_file);
    assert!(!calls[1].local_file);
    assert_eq!(calls[0].description.as_deref(), Some("Chorus at dusk"));
    assert_eq!(calls[0].created_at, t0);

    assert_eq!(repo.list_calls().await.unwrap().len(), 3);
}

#[tokio::test]
async fn calls_are_found_by_reference_and_joined_with_species_names() {
    let (_dir, repo) = setup().await;
    let species_id = repo
        .insert_species(&species("Golden Poison Frog", "Phyllobates terribilis"))
        .await
        .unwrap();
    let call_id = repo
        .insert_call(&NewCall::remote(species_id, "https://example.org/golden.mp3"))
        .await
        .unwrap();

    let found = repo
        .find_call_by_reference(species_id, "https://example.org/golden.mp3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.call_id, call_id);
    assert!(
        repo.find_call_by_reference(species_id, "https://example.org/other.mp3")
            .await
            .unwrap()
            .is_none()
    );

    let catalog = repo.list_calls_with_species().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].call.call_id, call_id);
    assert_eq!(catalog[0].species_name, "Golden Poison Frog");
    assert_eq!(catalog[0].scientific_name, "Phyllobates terribilis");
}

#[tokio::test]
async fn sightings_are_listed_in_observation_order() {
    let (_dir, repo) = setup().await;
    let species_id = repo.insert_species(&species("Wood Frog", "Lithobates sylvaticus")).await.unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 20, 6, 30, 0).unwrap();

    let second = repo
        .insert_sighting(&NewSighting {
            species_id,
            location: "North pond".to_string(),
            sighted_at: t0 + Duration::days(1),
            observer_name: None,
            notes: Some("Egg masses".to_string()),
            image_url: None,
        })
        .await
        .unwrap();
    let first = repo
        .insert_sighting(&NewSighting {
            species_id,
            location: "Vernal pool".to_string(),
            sighted_at: t0,
            observer_name: Some("R. Marsh".to_string()),
            notes: None,
            image_url: None,
        })
        .await
        .unwrap();

    let sightings = repo.list_sightings_for_species(species_id).await.unwrap();
    let ids: Vec<i64> = sightings.iter().map(|s| s.sighting_id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(sightings[0].observer_name.as_deref(), Some("R. Marsh"));
    assert_eq!(sightings[0].sighted_at, t0);

    let err = repo
        .insert_sighting(&NewSighting {
            species_id: 77,
            location: "Nowhere".to_string(),
            sighted_at: t0,
            observer_name: None,
            notes: None,
            image_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(ValidationError::UnknownSpecies(77))));
    assert_eq!(repo.list_sightings().await.unwrap().len(), 2);
}

#[tokio::test]
async fn projects_can_be_created_found_and_moved_between_statuses() {
    let (_dir, repo) = setup().await;
    let species_id = repo
        .insert_species(&species("Panamanian Golden Frog", "Atelopus zeteki"))
        .await
        .unwrap();

    let project = NewProject {
        species_id,
        name: "Amphibian Rescue".to_string(),
        description: None,
        organization: Some("Zoo Consortium".to_string()),
        start_date: NaiveDate::from_ymd_opt(2023, 1, 15),
        end_date: None,
        status: ProjectStatus::Planned,
    };
    let project_id = repo.insert_project(&project).await.unwrap();

    let found = repo
        .find_project_by_name(species_id, "amphibian rescue")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.project_id, project_id);
    assert_eq!(found.start_date, NaiveDate::from_ymd_opt(2023, 1, 15));
    assert_eq!(found.status, ProjectStatus::Planned);

    assert!(repo.update_project_status(project_id, ProjectStatus::Active).await.unwrap());
    assert!(!repo.update_project_status(project_id + 100, ProjectStatus::Active).await.unwrap());

    let updated = repo.get_project(project_id).await.unwrap().unwrap();
    assert_eq!(updated.status, ProjectStatus::Active);
    assert!(updated.updated_at >= updated.created_at);
    assert_eq!(repo.list_projects_for_species(species_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn project_ending_before_it_starts_is_rejected() {
    let (_dir, repo) = setup().await;
    let species_id = repo.insert_species(&species("Cane Toad", "Rhinella marina")).await.unwrap();

    let err = repo
        .insert_project(&NewProject {
            species_id,
            name: "Backwards".to_string(),
            description: None,
            organization: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            status: ProjectStatus::Planned,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DbError::Validation(ValidationError::InvalidField { field: "end_date", .. })
    ));
    assert!(repo.list_projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_database_reports_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    // The parent directory does not exist, so the file cannot be created.
    let settings = DatabaseSettings::sqlite(dir.path().join("missing").join("froggy.db"));
    let repo = DbRepository::new(ConnectionProvider::new(&settings).unwrap());

    let err = repo.list_species().await.unwrap_err();
    assert!(err.is_connection(), "expected a connection error, got {err:?}");
}
