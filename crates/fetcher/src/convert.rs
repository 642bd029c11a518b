use crate::error::ConversionError;
use async_trait::async_trait;
use std::path::Path;

/// Re-encodes an audio file into another container format.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Reads `input` and writes `output` in `format` (a bare extension such
    /// as "mp3", which `output` also carries). `output` may already exist and
    /// is overwritten.
    async fn convert(&self, input: &Path, output: &Path, format: &str) -> Result<(), ConversionError>;
}

/// Runs an external `ffmpeg` process.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    program: String,
}

impl FfmpegConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(&self, input: &Path, output: &Path, format: &str) -> Result<(), ConversionError> {
        tracing::debug!(input = %input.display(), output = %output.display(), format, "Converting audio.");

        let result = tokio::process::Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .arg("-vn")
            .arg(output)
            .output()
            .await
            .map_err(|source| ConversionError::ToolUnavailable {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(ConversionError::Failed {
                exit_code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
