use crate::error::{DownloadError, FetchError};
use async_trait::async_trait;
use configuration::HttpSettings;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Fetches the bytes of a remote recording.
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Writes the body of `url` to `dest`, replacing its contents, and returns
    /// the number of bytes written. A non-2xx answer is an error.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Downloads over HTTP(S) with a whole-request timeout. No retries.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

fn request_error(url: &str, source: reqwest::Error) -> DownloadError {
    if source.is_timeout() {
        DownloadError::Timeout { url: url.to_string() }
    } else if source.is_builder() {
        DownloadError::InvalidUrl { url: url.to_string() }
    } else {
        DownloadError::Request {
            url: url.to_string(),
            source,
        }
    }
}

#[async_trait]
impl AudioDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        tracing::debug!(url, "Requesting audio.");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| request_error(url, e))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(url, bytes = written, "Download complete.");
        Ok(written)
    }
}
