use crate::background::processors::accent::{AccentClassifier, AccentPrediction, display_name};
use crate::background::processors::audio::AudioExtractor;
use crate::background::processors::download::VideoFetcher;
use crate::background::scratch::ScratchDir;
use log::info;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

pub const ANALYSIS_SUMMARY: &str = "Analysis complete. The detected accent is based on the \
                                    dominant English accent identified in the audio segment \
                                    provided.";

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Extract,
    Classify,
    Unexpected,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Classify => "classify",
            Stage::Unexpected => "unexpected",
        })
    }
}

/// Failure taxonomy of a task. The `Display` form is the message delivered
/// to clients, stage prefix included.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Video download failed: {0:#}")]
    Download(anyhow::Error),
    #[error("Audio extraction failed: {0:#}")]
    Extract(anyhow::Error),
    #[error("Accent analysis failed: {0:#}")]
    Classify(anyhow::Error),
    #[error("An unexpected error occurred during processing: {0}")]
    Unexpected(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Download(_) => Stage::Download,
            PipelineError::Extract(_) => Stage::Extract,
            PipelineError::Classify(_) => Stage::Classify,
            PipelineError::Unexpected(_) => Stage::Unexpected,
        }
    }
}

/// Successful analysis payload, ready for JSON delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccentReport {
    /// Display name of the detected accent, absent when the model emits a
    /// label with no display mapping.
    pub accent: Option<&'static str>,
    /// Model confidence as a percentage string, e.g. "91.42%".
    pub confidence: String,
    pub summary: &'static str,
}

impl AccentReport {
    pub fn from_prediction(prediction: &AccentPrediction) -> Self {
        Self {
            accent: display_name(&prediction.label),
            confidence: format!("{:.2}%", prediction.probability * 100.0),
            summary: ANALYSIS_SUMMARY,
        }
    }
}

pub type PipelineResult = Result<AccentReport, PipelineError>;

/// Seam between the task registry and the analysis pipeline.
pub trait PipelineRunner: Send + Sync {
    fn run(&self, task_id: Uuid, url: &str) -> PipelineResult;
}

/// The full analysis chain for one submission: download the video, extract
/// a normalized audio track, classify the accent. Stages run strictly in
/// order and the first failure ends the run.
pub struct Pipeline {
    scratch: ScratchDir,
    fetcher: VideoFetcher,
    extractor: AudioExtractor,
    classifier: Box<dyn AccentClassifier>,
}

impl Pipeline {
    pub fn new(
        scratch: ScratchDir,
        fetcher: VideoFetcher,
        extractor: AudioExtractor,
        classifier: Box<dyn AccentClassifier>,
    ) -> Self {
        Self {
            scratch,
            fetcher,
            extractor,
            classifier,
        }
    }

    pub fn run(&self, task_id: Uuid, url: &str) -> PipelineResult {
        let video = self.scratch.video_path(task_id);
        let audio = self.scratch.audio_path(task_id);

        // Cleanup runs on every exit path, panics included.
        let _cleanup = ScratchGuard {
            scratch: &self.scratch,
            video: &video,
            audio: &audio,
        };

        self.execute(task_id, url, &video, &audio)
    }

    fn execute(&self, task_id: Uuid, url: &str, video: &Path, audio: &Path) -> PipelineResult {
        info!("Task {}: starting video download for {}", task_id, url);
        self.fetcher
            .fetch(url, video)
            .map_err(PipelineError::Download)?;

        info!("Task {}: extracting audio", task_id);
        self.extractor
            .extract(video, audio)
            .map_err(PipelineError::Extract)?;

        info!("Task {}: analyzing accent", task_id);
        let prediction = self
            .classifier
            .classify(audio)
            .map_err(PipelineError::Classify)?;
        info!(
            "Task {}: accent '{}' at {:.2}%",
            task_id,
            prediction.label,
            prediction.probability * 100.0
        );

        Ok(AccentReport::from_prediction(&prediction))
    }
}

/// Discards a task's scratch artifacts on drop, unwinding included.
struct ScratchGuard<'a> {
    scratch: &'a ScratchDir,
    video: &'a Path,
    audio: &'a Path,
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.scratch.discard(self.video);
        self.scratch.discard(self.audio);
    }
}

impl PipelineRunner for Pipeline {
    fn run(&self, task_id: Uuid, url: &str) -> PipelineResult {
        Pipeline::run(self, task_id, url)
    }
}
