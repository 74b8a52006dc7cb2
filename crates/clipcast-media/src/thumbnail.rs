//! Thumbnail extraction from finished clips.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use clipcast_models::encoding::{THUMBNAIL_JPEG_QUALITY, THUMBNAIL_SCALE_WIDTH};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{PipelineError, PipelineResult};
use crate::tools::ToolPaths;

/// Default thumbnail timeout.
const DEFAULT_THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(5);

/// Smallest seek offset used, so very short clips never seek to frame zero
/// of a stream that may start with a black flash, nor past end-of-file.
const MIN_SEEK_SECONDS: f64 = 0.05;

/// Extracts JPEG preview frames from clips.
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    tools: ToolPaths,
    timeout: Duration,
}

impl ThumbnailExtractor {
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            timeout: DEFAULT_THUMBNAIL_TIMEOUT,
        }
    }

    /// Override the per-frame timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract a single frame at the clip's midpoint.
    ///
    /// The seek point is clamped strictly inside `(0, duration)` so short
    /// clips cannot seek past end-of-file. Returns the thumbnail path, a
    /// `.jpg` sibling of the clip.
    pub async fn at_midpoint(
        &self,
        clip_path: impl AsRef<Path>,
        duration_seconds: f64,
    ) -> PipelineResult<PathBuf> {
        let clip_path = clip_path.as_ref();
        let output = clip_path.with_extension("jpg");

        let seek = midpoint_seek(duration_seconds);
        self.extract_frame(clip_path, &output, seek).await?;
        Ok(output)
    }

    /// Extract `count` frames at the midpoints of equal segments.
    ///
    /// Outputs land at `<stem>_thumb_<index>.jpg`. A zero count yields an
    /// empty strip without invoking anything.
    pub async fn strip(
        &self,
        clip_path: impl AsRef<Path>,
        duration_seconds: f64,
        count: usize,
    ) -> PipelineResult<Vec<PathBuf>> {
        let clip_path = clip_path.as_ref();
        let mut frames = Vec::with_capacity(count);

        for index in 0..count {
            let output = strip_frame_path(clip_path, index);
            let seek = strip_seek(duration_seconds, index, count);
            self.extract_frame(clip_path, &output, seek).await?;
            frames.push(output);
        }

        Ok(frames)
    }

    async fn extract_frame(
        &self,
        clip_path: &Path,
        output: &Path,
        seek_seconds: f64,
    ) -> PipelineResult<()> {
        if !clip_path.exists() {
            return Err(PipelineError::thumbnail_failed(
                clip_path,
                "clip file not found",
                None,
            ));
        }

        let cmd = FfmpegCommand::new(clip_path, output)
            .seek(seek_seconds)
            .single_frame()
            .video_filter(format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH))
            .output_args(["-q:v".to_string(), THUMBNAIL_JPEG_QUALITY.to_string()]);

        debug!(
            clip = %clip_path.display(),
            output = %output.display(),
            seek_seconds,
            "extracting thumbnail"
        );

        let runner = FfmpegRunner::new().with_timeout(self.timeout);
        runner
            .run(&self.tools.ffmpeg, &cmd.build_args())
            .await
            .map_err(|err| PipelineError::from_thumbnail_tool(clip_path, err))?;

        Ok(())
    }
}

/// Midpoint seek, clamped strictly inside `(0, duration)`.
fn midpoint_seek(duration_seconds: f64) -> f64 {
    if duration_seconds <= 0.0 {
        return MIN_SEEK_SECONDS;
    }
    // Margin shrinks for clips shorter than twice the normal margin, so the
    // clamp bounds stay ordered.
    let margin = MIN_SEEK_SECONDS.min(duration_seconds / 2.0);
    (duration_seconds / 2.0).clamp(margin, duration_seconds - margin)
}

/// Seek for frame `index` of `count`: the midpoint of its segment.
fn strip_seek(duration_seconds: f64, index: usize, count: usize) -> f64 {
    if count == 0 || duration_seconds <= 0.0 {
        return MIN_SEEK_SECONDS;
    }
    let segment = duration_seconds / count as f64;
    let margin = MIN_SEEK_SECONDS.min(segment / 2.0);
    ((index as f64 + 0.5) * segment).clamp(margin, duration_seconds - margin)
}

fn strip_frame_path(clip_path: &Path, index: usize) -> PathBuf {
    let stem = clip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    clip_path.with_file_name(format!("{stem}_thumb_{index}.jpg"))
}
