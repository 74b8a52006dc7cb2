//! Clip trimming via the external transcode tool.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use clipcast_models::{ArtifactId, OutputFormat, OutputProfile};

use crate::command::{FfmpegCommand, FfmpegRunner, ToolError};
use crate::error::{PipelineError, PipelineResult};
use crate::offsets::BufferOffsets;
use crate::tools::ToolPaths;

/// Cuts clips out of buffer files with ffmpeg.
///
/// Trims use seek-then-duration (`-ss in -t length`) semantics, which stay
/// correct when the probed duration is slightly off. Output lands at a
/// deterministic per-artifact path, so re-running a request overwrites
/// instead of accumulating files.
#[derive(Debug, Clone)]
pub struct Transcoder {
    tools: ToolPaths,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Transcoder {
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            cancel_rx: None,
        }
    }

    /// Attach a cancellation signal applied to every trim invocation.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Deterministic output path for an artifact's clip.
    pub fn output_path_for(
        session_dir: &Path,
        artifact_id: &ArtifactId,
        format: OutputFormat,
    ) -> PathBuf {
        session_dir.join(format!("clip_{}.{}", artifact_id, format.extension()))
    }

    /// Trim the offset window out of `source` into the session directory.
    ///
    /// The encoding profile is the static table entry for `format`. Renders
    /// to a `.part` sibling first and renames into place, so a crash or kill
    /// never leaves a half-written clip at the published path.
    pub async fn trim(
        &self,
        source: impl AsRef<Path>,
        offsets: &BufferOffsets,
        format: OutputFormat,
        session_dir: &Path,
        artifact_id: &ArtifactId,
        timeout: Duration,
    ) -> PipelineResult<PathBuf> {
        let source = source.as_ref();

        if !source.exists() {
            return Err(PipelineError::input_not_found(source));
        }

        tokio::fs::create_dir_all(session_dir).await.map_err(|err| {
            PipelineError::transcode_failed(
                source,
                format!("cannot create session dir {}: {err}", session_dir.display()),
                None,
                None,
            )
        })?;

        let output = Self::output_path_for(session_dir, artifact_id, format);
        let part = part_path(&output);
        let profile = OutputProfile::for_format(format);

        let cmd = FfmpegCommand::new(source, &part)
            .seek(offsets.in_seconds)
            .duration(offsets.duration_seconds)
            .output_args(profile.to_output_args())
            .muxer(format.muxer());

        let mut runner = FfmpegRunner::new().with_timeout(timeout);
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }

        debug!(
            source = %source.display(),
            output = %output.display(),
            in_seconds = offsets.in_seconds,
            duration_seconds = offsets.duration_seconds,
            "trimming clip"
        );

        if let Err(err) = runner.run(&self.tools.ffmpeg, &cmd.build_args()).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(PipelineError::from_transcode_tool(source, err));
        }

        tokio::fs::rename(&part, &output).await.map_err(|err| {
            PipelineError::transcode_failed(
                source,
                format!("cannot publish {}: {err}", output.display()),
                None,
                None,
            )
        })?;

        Ok(output)
    }

    /// Whether the transcode binary is installed and runnable.
    ///
    /// Same behavioural check as the prober: feed a nonexistent input and
    /// accept any tool-reported error as proof of installation.
    pub async fn is_available(&self) -> bool {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            "/nonexistent/clipcast-availability-check.mp4".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];

        let runner = FfmpegRunner::new().with_timeout(Duration::from_secs(5));
        match runner.run(&self.tools.ffmpeg, &args).await {
            Ok(_) | Err(ToolError::NonZeroExit { .. }) | Err(ToolError::Timeout { .. }) => true,
            Err(err) => {
                debug!("ffmpeg unavailable: {err}");
                false
            }
        }
    }
}

/// In-progress render path next to the final output.
fn part_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    name.push_str(".part");
    output.with_file_name(name)
}
