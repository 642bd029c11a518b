use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// The HTTP client could not be configured, e.g. an unusable user agent.
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl FetchError {
    /// True when the database could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, FetchError::Database(e) if e.is_connection())
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} timed out")]
    Timeout { url: String },

    #[error("'{url}' is not a valid download URL")]
    InvalidUrl { url: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("converter '{program}' could not be started: {source}")]
    ToolUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("converter exited with code {exit_code:?}: {stderr}")]
    Failed { exit_code: Option<i32>, stderr: String },
}
