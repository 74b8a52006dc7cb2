//! Environment self-check for the extraction pipeline.
//!
//! Verifies that ffprobe and ffmpeg respond behaviorally and that the
//! configured replay directory, if any, is readable. Exits non-zero on the
//! first hard miss so deploy scripts can gate on it.

use std::path::Path;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipcast_media::find_latest_buffer;
use clipcast_pipeline::{PipelineConfig, ReplayExtractor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let config = PipelineConfig::from_env();
    println!(
        "pipeline-selfcheck: starting with ffprobe={} ffmpeg={}",
        config.tools.ffprobe.display(),
        config.tools.ffmpeg.display()
    );

    let discovery_dir = config.discovery_dir.clone();
    let discovery_max_age = config.discovery_max_age;
    let extractor = ReplayExtractor::new(config);

    ensure_probe(&extractor).await?;
    ensure_transcode(&extractor).await?;
    if let Some(dir) = discovery_dir {
        ensure_replay_dir(&dir, discovery_max_age).await?;
    }

    println!("pipeline-selfcheck: ok");
    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::from_default_env().add_directive("clipcast=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn ensure_probe(extractor: &ReplayExtractor) -> anyhow::Result<()> {
    if !extractor.is_probe_available().await {
        return Err(anyhow::anyhow!(
            "ffprobe not available at {}",
            extractor.config().tools.ffprobe.display()
        ));
    }
    println!("pipeline-selfcheck: ffprobe responds");
    Ok(())
}

async fn ensure_transcode(extractor: &ReplayExtractor) -> anyhow::Result<()> {
    if !extractor.is_transcode_available().await {
        return Err(anyhow::anyhow!(
            "ffmpeg not available at {}",
            extractor.config().tools.ffmpeg.display()
        ));
    }
    println!("pipeline-selfcheck: ffmpeg responds");
    Ok(())
}

async fn ensure_replay_dir(dir: &Path, max_age: Duration) -> anyhow::Result<()> {
    tokio::fs::read_dir(dir)
        .await
        .map_err(|e| anyhow::anyhow!("replay directory {} not readable: {}", dir.display(), e))?;

    // A quiet directory is not an error; streamers save buffers on demand.
    match find_latest_buffer(dir, max_age).await {
        Some(path) => println!("pipeline-selfcheck: newest buffer file {}", path.display()),
        None => println!("pipeline-selfcheck: replay directory readable, no recent buffer files"),
    }
    Ok(())
}
