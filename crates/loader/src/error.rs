use database::DbError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read seed catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog as a whole is not a JSON array. Individual bad records
    /// are counted, not raised.
    #[error("Seed catalog is not a JSON array: {0}")]
    Catalog(#[from] serde_json::Error),

    /// Only connection failures end a load early.
    #[error(transparent)]
    Database(#[from] DbError),
}
