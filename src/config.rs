use anyhow::{Context, Result};
use dotenv::dotenv;
use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration, read once at startup from `ACCENTD_*` environment
/// variables. A `.env` file in the working directory is honored if present.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Number of pipeline workers running concurrently. Submissions beyond
    /// this count queue inside the worker pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Directory holding per-task video/audio scratch files.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Cache directory for model downloads (`HF_HOME` of the classifier).
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: PathBuf,
    /// Hugging Face source of the pretrained accent model.
    #[serde(default = "default_model_source")]
    pub model_source: String,
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    #[serde(default = "default_python_bin")]
    pub python_bin: String,
}

fn default_worker_count() -> usize {
    5
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./temp_files")
}

fn default_model_cache_dir() -> PathBuf {
    PathBuf::from("./.hf_cache")
}

fn default_model_source() -> String {
    "Jzuluaga/accent-id-commonaccent_ecapa".to_string()
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_python_bin() -> String {
    "python3".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            scratch_dir: default_scratch_dir(),
            model_cache_dir: default_model_cache_dir(),
            model_source: default_model_source(),
            ytdlp_bin: default_ytdlp_bin(),
            ffmpeg_bin: default_ffmpeg_bin(),
            python_bin: default_python_bin(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        envy::prefixed("ACCENTD_")
            .from_env::<AppConfig>()
            .context("failed to read ACCENTD_* environment variables")
    }
}
