//! # Froggy Fetcher Crate
//!
//! Downloads remote frog calls into the local audio tree and records them as
//! local calls.
//!
//! A fetch is idempotent: the target path is derived from the species and the
//! source URL, so a second run finds the file and makes no network request.
//! Downloads and conversions are written to temporary files next to the
//! target and only renamed into place once complete; every failure path
//! leaves the audio tree as it was.

pub mod convert;
pub mod download;
pub mod error;
pub mod paths;

pub use convert::{AudioConverter, FfmpegConverter};
pub use download::{AudioDownloader, HttpDownloader};
pub use error::{ConversionError, DownloadError, FetchError};

use configuration::{AssetSettings, Config};
use core_types::NewCall;
use database::{DbRepository, ValidationError};
use std::path::{Path, PathBuf};

/// One remote recording to bring into the local tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAsset {
    pub species_id: i64,
    pub species_name: String,
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// The file was downloaded (and converted, if needed) on this run.
    Fetched,
    /// The file was already in place; nothing was downloaded.
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub call_id: i64,
    pub status: FetchStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogFetchSummary {
    pub fetched: usize,
    pub already_present: usize,
    pub failed: usize,
}

pub struct AssetFetcher {
    repo: DbRepository,
    audio_root: PathBuf,
    convert_to: Option<String>,
    downloader: Box<dyn AudioDownloader>,
    converter: Box<dyn AudioConverter>,
}

impl AssetFetcher {
    pub fn new(
        repo: DbRepository,
        settings: &AssetSettings,
        downloader: Box<dyn AudioDownloader>,
        converter: Box<dyn AudioConverter>,
    ) -> Self {
        Self {
            repo,
            audio_root: settings.audio_root.clone(),
            convert_to: settings.convert_to.as_ref().map(|ext| ext.to_ascii_lowercase()),
            downloader,
            converter,
        }
    }

    /// The production wiring: HTTP downloads and an external ffmpeg.
    pub fn from_config(repo: DbRepository, config: &Config) -> Result<Self, FetchError> {
        let downloader = HttpDownloader::new(&config.http)?;
        let converter = FfmpegConverter::new(config.assets.converter_program.clone());
        Ok(Self::new(repo, &config.assets, Box::new(downloader), Box::new(converter)))
    }

    pub fn audio_root(&self) -> &Path {
        &self.audio_root
    }

    /// The path `asset` is stored at, whether or not it has been fetched yet.
    pub fn target_path(&self, asset: &CallAsset) -> PathBuf {
        let extension = self.target_extension(&asset.url);
        paths::asset_path(&self.audio_root, asset.species_id, &asset.species_name, &asset.url, &extension)
    }

    fn target_extension(&self, url: &str) -> String {
        self.convert_to.clone().unwrap_or_else(|| paths::source_extension(url))
    }

    /// Brings one recording into the local tree and makes sure a local call
    /// row points at it.
    pub async fn fetch_call(&self, asset: &CallAsset) -> Result<FetchOutcome, FetchError> {
        let target = self.target_path(asset);
        let reference = target.to_string_lossy().into_owned();

        if tokio::fs::try_exists(&target).await? {
            // A previous run may have stopped between writing the file and
            // recording it.
            let call_id = self.ensure_call(asset, &reference).await?;
            tracing::info!(path = %target.display(), "Audio already present, skipping download.");
            return Ok(FetchOutcome {
                path: target,
                call_id,
                status: FetchStatus::AlreadyPresent,
            });
        }

        if self.repo.get_species(asset.species_id).await?.is_none() {
            return Err(database::DbError::from(ValidationError::UnknownSpecies(asset.species_id)).into());
        }

        self.write_asset(asset, &target).await?;
        let call_id = self.ensure_call(asset, &reference).await?;
        tracing::info!(url = %asset.url, path = %target.display(), call_id, "Fetched audio.");

        Ok(FetchOutcome {
            path: target,
            call_id,
            status: FetchStatus::Fetched,
        })
    }

    async fn write_asset(&self, asset: &CallAsset, target: &Path) -> Result<(), FetchError> {
        let dir = target.parent().unwrap_or(&self.audio_root);
        tokio::fs::create_dir_all(dir).await?;

        let source_ext = paths::source_extension(&asset.url);
        let target_ext = self.target_extension(&asset.url);

        // Both temporaries are deleted when dropped, on every early return.
        let download = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(&format!(".{}", source_ext))
            .tempfile_in(dir)?;
        self.downloader.download(&asset.url, download.path()).await?;

        let finished = if self.convert_to.is_some() && source_ext != target_ext {
            let converted = tempfile::Builder::new()
                .prefix(".convert-")
                .suffix(&format!(".{}", target_ext))
                .tempfile_in(dir)?;
            self.converter
                .convert(download.path(), converted.path(), &target_ext)
                .await?;
            converted
        } else {
            download
        };

        finished.persist(target).map_err(|e| FetchError::Io(e.error))?;
        Ok(())
    }

    async fn ensure_call(&self, asset: &CallAsset, reference: &str) -> Result<i64, FetchError> {
        if let Some(call) = self.repo.find_call_by_reference(asset.species_id, reference).await? {
            return Ok(call.call_id);
        }
        let mut call = NewCall::local(asset.species_id, reference);
        call.description = asset.description.clone();
        Ok(self.repo.insert_call(&call).await?)
    }

    /// Every remote call in the catalog, as fetchable assets.
    pub async fn remote_catalog(&self) -> Result<Vec<CallAsset>, FetchError> {
        let calls = self.repo.list_calls_with_species().await?;
        Ok(calls
            .into_iter()
            .filter(|entry| !entry.call.local_file)
            .map(|entry| CallAsset {
                species_id: entry.call.species_id,
                species_name: entry.species_name,
                url: entry.call.audio_url,
                description: entry.call.description,
            })
            .collect())
    }

    /// Fetches each asset in turn, continuing past per-asset failures.
    /// `on_done` is called after every asset. A connection error stops the run.
    pub async fn fetch_all<F>(&self, assets: &[CallAsset], mut on_done: F) -> Result<CatalogFetchSummary, FetchError>
    where
        F: FnMut(&CallAsset, &Result<FetchOutcome, FetchError>),
    {
        let mut summary = CatalogFetchSummary::default();
        for asset in assets {
            let result = self.fetch_call(asset).await;
            on_done(asset, &result);
            match result {
                Ok(FetchOutcome {
                    status: FetchStatus::Fetched,
                    ..
                }) => summary.fetched += 1,
                Ok(FetchOutcome {
                    status: FetchStatus::AlreadyPresent,
                    ..
                }) => summary.already_present += 1,
                Err(e) if e.is_connection() => return Err(e),
                Err(e) => {
                    tracing::warn!(url = %asset.url, species = %asset.species_name, error = %e, "Failed to fetch audio.");
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            fetched = summary.fetched,
            already_present = summary.already_present,
            failed = summary.failed,
            "Catalog fetch finished."
        );
        Ok(summary)
    }

    pub async fn fetch_catalog(&self) -> Result<CatalogFetchSummary, FetchError> {
        let assets = self.remote_catalog().await?;
        self.fetch_all(&assets, |_, _| {}).await
    }
}
