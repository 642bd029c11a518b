use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use configuration::{Config, init_tracing, load_config};
use core_types::{AudioSource, NewProject, NewSighting, ProjectStatus, preferred_call};
use database::{ConnectionProvider, DbError, DbRepository, run_migrations};
use fetcher::{AssetFetcher, CallAsset, FetchStatus};
use indicatif::{ProgressBar, ProgressStyle};
use loader::{LoadSummary, SeedSources, seed_all};
use std::path::PathBuf;

/// The main entry point for the Feeling Froggy data tools.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;
    tracing::debug!(database = ?config.database, assets = ?config.assets, "Configuration loaded.");

    let provider = ConnectionProvider::new(&config.database).context("Invalid database settings")?;
    let repo = DbRepository::new(provider.clone());

    match cli.command {
        Commands::Check => handle_check(&provider).await,
        Commands::Migrate => {
            run_migrations(&provider).await?;
            println!("Database schema is up to date.");
            Ok(())
        }
        Commands::Setup => handle_setup(&provider, &repo).await,
        Commands::Seed(args) => handle_seed(&repo, args).await,
        Commands::Species(args) => handle_species(&repo, args).await,
        Commands::Calls(args) => handle_calls(&repo, args).await,
        Commands::Sightings { command } => handle_sightings(&repo, command).await,
        Commands::Projects { command } => handle_projects(&repo, command).await,
        Commands::Fetch(args) => handle_fetch(repo, &config, args).await,
        Commands::FetchCatalog => handle_fetch_catalog(repo, &config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Data tools for the Feeling Froggy frog catalog.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./froggy.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the database connection.
    Check,
    /// Apply the bundled schema migrations.
    Migrate,
    /// Check the connection, migrate and load the bundled catalogs.
    Setup,
    /// Load species, calls and projects from seed catalogs.
    Seed(SeedArgs),
    /// List or search species, or show one in detail.
    Species(SpeciesArgs),
    /// List calls with their species.
    Calls(CallsArgs),
    /// Record and list field sightings.
    Sightings {
        #[command(subcommand)]
        command: SightingCommands,
    },
    /// Manage conservation projects.
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Download one remote call into the local audio tree.
    Fetch(FetchArgs),
    /// Download every remote call in the catalog.
    FetchCatalog,
}

#[derive(Args)]
struct SeedArgs {
    /// Species catalog (JSON array). Uses the bundled catalog when omitted.
    #[arg(long)]
    species: Option<PathBuf>,
    /// Call catalog (JSON array).
    #[arg(long)]
    calls: Option<PathBuf>,
    /// Conservation project catalog (JSON array).
    #[arg(long)]
    projects: Option<PathBuf>,
}

#[derive(Args)]
struct SpeciesArgs {
    /// Show a single species with its calls and projects.
    #[arg(long, conflicts_with = "search")]
    id: Option<i64>,
    /// Substring to match against common and scientific names.
    #[arg(long)]
    search: Option<String>,
}

#[derive(Args)]
struct CallsArgs {
    /// Only list calls of this species.
    #[arg(long)]
    species_id: Option<i64>,
}

#[derive(Subcommand)]
enum SightingCommands {
    /// List sightings, optionally for one species.
    List {
        #[arg(long)]
        species_id: Option<i64>,
    },
    /// Record a sighting.
    Add {
        #[arg(long)]
        species_id: i64,
        #[arg(long)]
        location: String,
        /// When the frog was seen (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        #[arg(long)]
        observer: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List projects, optionally for one species.
    List {
        #[arg(long)]
        species_id: Option<i64>,
    },
    /// Create a project.
    Add {
        #[arg(long)]
        species_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        organization: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Start date (format: YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,
        /// End date (format: YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Planned, Active, Completed or Suspended.
        #[arg(long, default_value = "Planned")]
        status: ProjectStatus,
    },
    /// Move a project to a new status.
    SetStatus {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        status: ProjectStatus,
    },
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    species_id: i64,
    /// The remote recording to download.
    #[arg(long)]
    url: String,
    #[arg(long)]
    description: Option<String>,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

async fn handle_check(provider: &ConnectionProvider) -> Result<()> {
    match provider.ping().await {
        Ok(()) => {
            println!("Connected to the {:?} database.", provider.driver());
            Ok(())
        }
        Err(DbError::Connection { cause, message }) => {
            bail!("Database connection failed ({cause}): {message}")
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_setup(provider: &ConnectionProvider, repo: &DbRepository) -> Result<()> {
    handle_check(provider).await?;
    run_migrations(provider).await.context("Failed to apply migrations")?;
    println!("Database schema is up to date.");

    let report = seed_all(repo, SeedSources::default()).await?;
    print_seed_report(&report);

    println!(
        "Catalog holds {} species and {} calls.",
        repo.count_species().await?,
        repo.count_calls().await?
    );
    Ok(())
}

async fn handle_seed(repo: &DbRepository, args: SeedArgs) -> Result<()> {
    let sources = SeedSources {
        species: args.species.as_deref(),
        calls: args.calls.as_deref(),
        projects: args.projects.as_deref(),
    };
    let report = seed_all(repo, sources).await?;
    print_seed_report(&report);
    Ok(())
}

fn print_seed_report(report: &loader::SeedReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Catalog", "Inserted", "Skipped", "Failed"]);
    let rows: [(&str, &LoadSummary); 3] = [
        ("species", &report.species),
        ("calls", &report.calls),
        ("projects", &report.projects),
    ];
    for (name, summary) in rows {
        table.add_row(vec![
            name.to_string(),
            summary.inserted.to_string(),
            summary.skipped.to_string(),
            summary.failed.to_string(),
        ]);
    }
    println!("{table}");
}

async fn handle_species(repo: &DbRepository, args: SpeciesArgs) -> Result<()> {
    if let Some(id) = args.id {
        return show_species(repo, id).await;
    }

    let species = match &args.search {
        Some(term) => repo.search_species(term).await?,
        None => repo.list_species().await?,
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Scientific name", "Region", "Status"]);
    for s in &species {
        table.add_row(vec![
            s.species_id.to_string(),
            s.name.clone(),
            s.scientific_name.clone(),
            s.region.clone().unwrap_or_default(),
            s.conservation_status.to_string(),
        ]);
    }
    println!("{table}");
    println!("{} species.", species.len());
    Ok(())
}

async fn show_species(repo: &DbRepository, id: i64) -> Result<()> {
    let Some(species) = repo.get_species(id).await? else {
        bail!("No species with id {id}");
    };

    println!("{} ({})", species.name, species.scientific_name);
    println!(
        "Status: {} [{}]{}",
        species.conservation_status,
        species.conservation_status.code(),
        if species.conservation_status.is_threatened() { " - threatened" } else { "" }
    );
    if let Some(description) = &species.description {
        println!("\n{description}");
    }
    if let Some(vocalization) = &species.vocalization_description {
        println!("Sounds like: {vocalization}");
    }
    if let Some(url) = &species.vocalization_url {
        println!("Reference recording: {url}");
    }

    let calls = repo.list_calls_for_species(id).await?;
    match preferred_call(&calls, |path| path.exists()) {
        Some((_, AudioSource::Local(path))) => println!("Playback: {}", path.display()),
        Some((_, AudioSource::Remote(url))) => println!("Playback (stream): {url}"),
        None => println!("Playback: no recordings yet"),
    }
    println!("{} call(s) on record.", calls.len());

    let projects = repo.list_projects_for_species(id).await?;
    for project in &projects {
        println!(
            "Project: {} [{}]{}",
            project.name,
            project.status,
            project
                .organization
                .as_deref()
                .map(|org| format!(" by {org}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn handle_calls(repo: &DbRepository, args: CallsArgs) -> Result<()> {
    let calls = repo.list_calls_with_species().await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Species", "Source", "Audio", "Description"]);
    let mut shown = 0;
    for entry in calls
        .iter()
        .filter(|entry| args.species_id.is_none_or(|id| entry.call.species_id == id))
    {
        table.add_row(vec![
            entry.call.call_id.to_string(),
            entry.species_name.clone(),
            if entry.call.local_file { "local" } else { "remote" }.to_string(),
            entry.call.audio_url.clone(),
            entry.call.description.clone().unwrap_or_default(),
        ]);
        shown += 1;
    }
    println!("{table}");
    println!("{shown} call(s).");
    Ok(())
}

async fn handle_sightings(repo: &DbRepository, command: SightingCommands) -> Result<()> {
    match command {
        SightingCommands::List { species_id } => {
            let sightings = match species_id {
                Some(id) => repo.list_sightings_for_species(id).await?,
                None => repo.list_sightings().await?,
            };
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Species", "Location", "Seen at", "Observer", "Notes"]);
            for s in &sightings {
                table.add_row(vec![
                    s.sighting_id.to_string(),
                    s.species_id.to_string(),
                    s.location.clone(),
                    s.sighted_at.format("%Y-%m-%d %H:%M").to_string(),
                    s.observer_name.clone().unwrap_or_default(),
                    s.notes.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        SightingCommands::Add {
            species_id,
            location,
            at,
            observer,
            notes,
            image_url,
        } => {
            let id = repo
                .insert_sighting(&NewSighting {
                    species_id,
                    location,
                    sighted_at: at.unwrap_or_else(Utc::now),
                    observer_name: observer,
                    notes,
                    image_url,
                })
                .await?;
            println!("Recorded sighting {id}.");
        }
    }
    Ok(())
}

async fn handle_projects(repo: &DbRepository, command: ProjectCommands) -> Result<()> {
    match command {
        ProjectCommands::List { species_id } => {
            let projects = match species_id {
                Some(id) => repo.list_projects_for_species(id).await?,
                None => repo.list_projects().await?,
            };
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Species", "Name", "Organization", "Start", "End", "Status"]);
            let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
            for p in &projects {
                table.add_row(vec![
                    p.project_id.to_string(),
                    p.species_id.to_string(),
                    p.name.clone(),
                    p.organization.clone().unwrap_or_default(),
                    date(p.start_date),
                    date(p.end_date),
                    p.status.to_string(),
                ]);
            }
            println!("{table}");
        }
        ProjectCommands::Add {
            species_id,
            name,
            organization,
            description,
            start,
            end,
            status,
        } => {
            let id = repo
                .insert_project(&NewProject {
                    species_id,
                    name,
                    description,
                    organization,
                    start_date: start,
                    end_date: end,
                    status,
                })
                .await?;
            println!("Created project {id}.");
        }
        ProjectCommands::SetStatus { id, status } => {
            if !repo.update_project_status(id, status).await? {
                bail!("No project with id {id}");
            }
            println!("Project {id} is now {status}.");
        }
    }
    Ok(())
}

async fn handle_fetch(repo: DbRepository, config: &Config, args: FetchArgs) -> Result<()> {
    let Some(species) = repo.get_species(args.species_id).await? else {
        bail!("No species with id {}", args.species_id);
    };
    let fetcher = AssetFetcher::from_config(repo, config)?;
    let outcome = fetcher
        .fetch_call(&CallAsset {
            species_id: species.species_id,
            species_name: species.name,
            url: args.url,
            description: args.description,
        })
        .await?;

    match outcome.status {
        FetchStatus::Fetched => println!("Saved {} (call {}).", outcome.path.display(), outcome.call_id),
        FetchStatus::AlreadyPresent => {
            println!("Already present: {} (call {}).", outcome.path.display(), outcome.call_id)
        }
    }
    Ok(())
}

async fn handle_fetch_catalog(repo: DbRepository, config: &Config) -> Result<()> {
    let fetcher = AssetFetcher::from_config(repo, config)?;
    let assets = fetcher.remote_catalog().await?;

    let progress_bar = ProgressBar::new(assets.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let summary = fetcher
        .fetch_all(&assets, |asset, result| {
            let state = match result {
                Ok(outcome) if outcome.status == FetchStatus::Fetched => "fetched",
                Ok(_) => "present",
                Err(_) => "failed",
            };
            progress_bar.set_message(format!("{} ({state})", asset.species_name));
            progress_bar.inc(1);
        })
        .await?;

    progress_bar.finish_with_message("Catalog fetch complete!");
    println!(
        "{} fetched, {} already present, {} failed.",
        summary.fetched, summary.already_present, summary.failed
    );
    Ok(())
}
