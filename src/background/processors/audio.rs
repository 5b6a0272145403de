use anyhow::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Sample rate the accent model was trained on.
const TARGET_SAMPLE_RATE: &str = "16000";

/// Extracts a normalized audio track from a downloaded video by shelling
/// out to ffmpeg.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    bin: String,
}

impl AudioExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Creates a base ffmpeg command with flags to keep it quiet. ffmpeg
    /// still writes real errors to stderr at this level, which is what the
    /// failure detail is built from. Global options must come before `-i`.
    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-v", "error", "-hide_banner", "-nostats", "-nostdin"]);
        cmd
    }

    /// Decode `video` into a mono 16 kHz WAV at `output`.
    pub fn extract(&self, video: &Path, output: &Path) -> Result<()> {
        let video_str = video.to_string_lossy();
        let output_str = output.to_string_lossy();

        let mut cmd = self.base_command();
        cmd.args([
            "-i",
            &*video_str,
            "-ar",
            TARGET_SAMPLE_RATE,
            "-ac",
            "1",
            "-vn",
            "-y",
            &*output_str,
        ]);

        let result = cmd.output().context(format!(
            "failed to spawn {} for audio extraction of {:?}",
            self.bin, video
        ))?;

        if !result.status.success() {
            bail!(
                "{} failed for {:?} with status code {:?}: {}",
                self.bin,
                video,
                result.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        let size = fs::metadata(output).map(|meta| meta.len()).unwrap_or(0);
        if size == 0 {
            bail!("extracted audio file is missing or empty: {:?}", output);
        }

        info!("Extracted {} bytes of audio to {:?}", size, output);
        Ok(())
    }
}
