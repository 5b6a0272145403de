#[macro_use]
extern crate rocket;
use anyhow::{Context, Result};

mod api;
mod background;
mod config;

use crate::background::pipeline::Pipeline;
use crate::background::processors::accent::SpeechBrainClassifier;
use crate::background::processors::audio::AudioExtractor;
use crate::background::processors::download::VideoFetcher;
use crate::background::processors::setup::{check_external_tools, initialize_logger};
use crate::background::registry::TaskRegistry;
use crate::background::scratch::ScratchDir;
use crate::config::AppConfig;

use log::info;
use std::sync::Arc;

#[rocket::main]
async fn main() -> Result<()> {
    initialize_logger();

    let config = AppConfig::from_env()?;
    check_external_tools(&config);

    let scratch =
        ScratchDir::new(&config.scratch_dir).context("failed to prepare the scratch directory")?;
    info!("Scratch directory ready at {:?}", scratch.root());
    scratch.sweep();

    let classifier = SpeechBrainClassifier::spawn(
        &config.python_bin,
        &config.model_source,
        &config.model_cache_dir,
    )
    .context("failed to start the accent classifier")?;

    let pipeline = Pipeline::new(
        scratch,
        VideoFetcher::new(config.ytdlp_bin),
        AudioExtractor::new(config.ffmpeg_bin),
        Box::new(classifier),
    );
    let registry = TaskRegistry::new(Arc::new(pipeline), config.worker_count)
        .context("failed to start the pipeline worker pool")?;
    info!("Accepting submissions on {} worker(s)", config.worker_count);

    let _rocket = api::build(registry).launch().await?;

    Ok(())
}
