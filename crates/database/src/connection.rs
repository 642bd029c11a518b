use crate::error::{ConnectionCause, DbError};
use configuration::DatabaseSettings;
use futures::future::BoxFuture;
use sqlx::migrate::Migrator;
use sqlx::{AnyConnection, Connection};
use std::fmt;
use url::Url;

/// The database engines this build can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    Sqlite,
}

impl Driver {
    /// Parses a driver identifier from configuration.
    pub fn parse(identifier: &str) -> Result<Self, DbError> {
        match identifier.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "sqlite" => Ok(Driver::Sqlite),
            other => Err(DbError::connection(
                ConnectionCause::DriverMissing,
                format!("no driver named '{}' is available (expected 'postgres' or 'sqlite')", other),
            )),
        }
    }

    fn from_url(url: &str) -> Result<Self, DbError> {
        let scheme = url.split(':').next().unwrap_or_default();
        Self::parse(scheme)
    }
}

/// Opens connections to the configured database.
///
/// There is no pool: each acquisition is a fresh, single connection attempt,
/// and the connection is closed when the scope that acquired it ends.
#[derive(Clone)]
pub struct ConnectionProvider {
    url: String,
    driver: Driver,
}

// The URL carries credentials.
impl fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl ConnectionProvider {
    /// Builds a provider from explicit settings. Nothing is read from the
    /// environment here, and no connection is attempted yet.
    pub fn new(settings: &DatabaseSettings) -> Result<Self, DbError> {
        sqlx::any::install_default_drivers();

        let (driver, url) = match &settings.url {
            Some(url) => (Driver::from_url(url)?, url.clone()),
            None => {
                let driver = Driver::parse(&settings.driver)?;
                (driver, build_url(driver, settings)?)
            }
        };

        Ok(Self { url, driver })
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Makes a single connection attempt.
    ///
    /// Prefer [`ConnectionProvider::with_connection`]; a connection returned
    /// from here is only closed when the caller drops or closes it.
    pub async fn open(&self) -> Result<AnyConnection, DbError> {
        tracing::debug!(driver = ?self.driver, "Opening database connection.");
        AnyConnection::connect(&self.url)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Runs `op` with a freshly opened connection and closes it afterwards,
    /// whether `op` succeeded or failed. If `op` panics or its future is
    /// dropped, the connection is dropped with it.
    pub async fn with_connection<T, F>(&self, op: F) -> Result<T, DbError>
    where
        F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T, DbError>>,
    {
        let mut conn = self.open().await?;
        let result = op(&mut conn).await;
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "Failed to close database connection cleanly.");
        }
        result
    }

    /// Connectivity check: opens a connection and runs `SELECT 1`.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.with_connection(|conn| {
            Box::pin(async move {
                sqlx::query("SELECT 1")
                    .execute(&mut *conn)
                    .await
                    .map_err(DbError::Query)?;
                Ok(())
            })
        })
        .await
    }

    fn classify(&self, error: sqlx::Error) -> DbError {
        let cause = match &error {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => ConnectionCause::Unreachable,
            sqlx::Error::Configuration(_) => ConnectionCause::InvalidConfiguration,
            sqlx::Error::Database(db_error) => {
                let code = db_error.code();
                match (self.driver, code.as_deref()) {
                    // invalid_password, invalid_authorization_specification
                    (Driver::Postgres, Some("28P01" | "28000")) => ConnectionCause::AuthenticationRejected,
                    // invalid_catalog_name: the database itself does not exist
                    (Driver::Postgres, Some("3D000")) => ConnectionCause::Unreachable,
                    // SQLITE_CANTOPEN and its extended codes
                    (Driver::Sqlite, Some(code)) if code.parse::<i32>().is_ok_and(|c| c & 0xff == 14) => {
                        ConnectionCause::Unreachable
                    }
                    _ => ConnectionCause::Other,
                }
            }
            _ => ConnectionCause::Other,
        };
        DbError::connection(cause, error.to_string())
    }
}

/// Applies the bundled schema migrations for the provider's driver.
pub async fn run_migrations(provider: &ConnectionProvider) -> Result<(), DbError> {
    let driver = provider.driver();
    provider
        .with_connection(move |conn| {
            Box::pin(async move {
                let migrator: Migrator = match driver {
                    Driver::Postgres => sqlx::migrate!("./migrations/postgres"),
                    Driver::Sqlite => sqlx::migrate!("./migrations/sqlite"),
                };
                migrator.run_direct(&mut *conn).await?;
                tracing::info!(driver = ?driver, "Database migrations applied.");
                Ok(())
            })
        })
        .await
}

fn build_url(driver: Driver, settings: &DatabaseSettings) -> Result<String, DbError> {
    let invalid = |message: String| DbError::connection(ConnectionCause::InvalidConfiguration, message);

    match driver {
        Driver::Sqlite => {
            if settings.name.trim().is_empty() {
                return Err(invalid("database.name must hold the SQLite file path".to_string()));
            }
            // mode=rwc creates the file on first use.
            Ok(format!("sqlite://{}?mode=rwc", settings.name))
        }
        Driver::Postgres => {
            let mut url = Url::parse("postgres://localhost").map_err(|e| invalid(e.to_string()))?;
            url.set_host(Some(&settings.host))
                .map_err(|e| invalid(format!("invalid database.host '{}': {}", settings.host, e)))?;
            url.set_port(settings.port)
                .map_err(|_| invalid("database.port cannot be set on this URL".to_string()))?;

            if !settings.integrated_auth {
                let username = settings
                    .username
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| {
                        invalid("database.username is required unless integrated_auth is enabled".to_string())
                    })?;
                url.set_username(username)
                    .map_err(|_| invalid("database.username cannot be set on this URL".to_string()))?;
                url.set_password(settings.password.as_deref())
                    .map_err(|_| invalid("database.password cannot be set on this URL".to_string()))?;
            }

            url.set_path(&settings.name);
            Ok(url.to_string())
        }
    }
}
