use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{AssetSettings, Config, DatabaseSettings, HttpSettings, LoggingSettings};

/// Loads the application configuration.
///
/// Sources, lowest precedence first:
/// 1. `path` if given (must exist), otherwise an optional `froggy.toml` in the working directory.
/// 2. Environment variables prefixed `FROGGY__`, nested with `__`
///    (e.g. `FROGGY__DATABASE__PASSWORD`).
/// 3. `DATABASE_URL`, when no URL was configured explicitly.
///
/// The result is validated before it is returned. Callers pass it on
/// explicitly; nothing here is stored globally.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("froggy").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("FROGGY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;
    apply_database_url(&mut config, std::env::var("DATABASE_URL").ok());
    validate(&config)?;

    Ok(config)
}

/// `DATABASE_URL` fills in the URL only when the configuration doesn't name one.
fn apply_database_url(config: &mut Config, database_url: Option<String>) {
    if config.database.url.is_none() {
        config.database.url = database_url.filter(|url| !url.trim().is_empty());
    }
}

/// Rejects settings that can never work, before anything tries to use them.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let db = &config.database;
    if db.url.is_none() {
        if db.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.name must be set when database.url is not".to_string(),
            ));
        }
        if db.driver.eq_ignore_ascii_case("postgres") && db.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.host must be set for the postgres driver".to_string(),
            ));
        }
    }
    if config.assets.audio_root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError("assets.audio_root must not be empty".to_string()));
    }
    if let Some(format) = &config.assets.convert_to {
        if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::ValidationError(format!(
                "assets.convert_to must be a bare file extension, got '{}'",
                format
            )));
        }
    }
    if config.http.timeout_secs == 0 {
        return Err(ConfigError::ValidationError("http.timeout_secs must be greater than zero".to_string()));
    }
    Ok(())
}
