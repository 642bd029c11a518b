use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty `froggy.toml` (or none at all) is
/// a valid configuration for a local Postgres instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// How to reach the database.
///
/// Either `url` is set (it wins, and its scheme picks the driver) or the
/// individual fields are combined into one. For the `sqlite` driver `name` is
/// the path of the database file.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Driver identifier: "postgres" or "sqlite".
    pub driver: String,
    pub url: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Let the server authenticate the OS user (peer/GSS) instead of a password.
    pub integrated_auth: bool,
}

impl DatabaseSettings {
    /// Settings for a SQLite database file, created on first connect.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            driver: "sqlite".to_string(),
            name: path.as_ref().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            driver: "postgres".to_string(),
            url: None,
            host: "127.0.0.1".to_string(),
            port: None,
            name: "froggy".to_string(),
            username: None,
            password: None,
            integrated_auth: false,
        }
    }
}

// Hand-written so the password never ends up in logs.
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("driver", &self.driver)
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("integrated_auth", &self.integrated_auth)
            .finish()
    }
}

/// Local storage for downloaded frog calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Root of the audio tree. Call rows store paths under this root.
    pub audio_root: PathBuf,
    /// Target container for downloaded audio (e.g. "mp3"). `None` keeps the
    /// source format and never invokes the converter.
    pub convert_to: Option<String>,
    /// The converter executable.
    pub converter_program: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            audio_root: PathBuf::from("static/audio"),
            convert_to: Some("mp3".to_string()),
            converter_program: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Whole-request timeout for audio downloads.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("feeling-froggy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
