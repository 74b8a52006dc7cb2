//! The extraction orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use clipcast_media::{
    compute_offsets, find_latest_buffer, BufferOffsets, PipelineResult, Prober,
    ThumbnailExtractor, Transcoder,
};
use clipcast_models::{
    ExtractionStage, ExtractionUpdate, OutputProfile, TrimRequest, TrimResult, VideoMetadata,
};

use crate::config::PipelineConfig;
use crate::sink::ResultSink;

/// Best-effort replay-buffer clip extractor.
///
/// Runs probe, offset mapping, trim, and thumbnail extraction as one
/// sequential pipeline per request, bounded across requests by a semaphore.
/// The public entry points never fail: every internal error is classified,
/// logged with the full request context, and collapsed to `None`.
#[derive(Clone)]
pub struct ReplayExtractor {
    config: Arc<PipelineConfig>,
    prober: Prober,
    transcoder: Transcoder,
    thumbnails: ThumbnailExtractor,
    permits: Arc<Semaphore>,
}

impl ReplayExtractor {
    /// Build an extractor from configuration.
    pub fn new(config: PipelineConfig) -> Self {
        let prober = Prober::new(config.tools.clone()).with_timeout(config.probe_timeout);
        let transcoder = Transcoder::new(config.tools.clone());
        let thumbnails =
            ThumbnailExtractor::new(config.tools.clone()).with_timeout(config.thumbnail_timeout);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_extractions.max(1)));

        Self {
            config: Arc::new(config),
            prober,
            transcoder,
            thumbnails,
            permits,
        }
    }

    /// Attach a cancellation signal applied to in-flight transcodes.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.transcoder = self.transcoder.with_cancel(cancel_rx);
        self
    }

    /// Shared pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether the probe binary is reachable.
    pub async fn is_probe_available(&self) -> bool {
        self.prober.is_available().await
    }

    /// Whether the transcode binary is reachable.
    pub async fn is_transcode_available(&self) -> bool {
        self.transcoder.is_available().await
    }

    /// Extract the requested clip, best-effort.
    ///
    /// Returns `None` on any failure; callers proceed with the raw buffer
    /// path. No error ever crosses this boundary and there is no internal
    /// retry.
    pub async fn extract(&self, request: &TrimRequest) -> Option<TrimResult> {
        self.run_logged(request).await.ok()
    }

    /// Extract and push the terminal update into `sink`.
    ///
    /// Always delivers exactly one update (result or failure); sink errors
    /// are warned and swallowed.
    pub async fn extract_and_deliver(
        &self,
        request: &TrimRequest,
        sink: &dyn ResultSink,
    ) -> Option<TrimResult> {
        let outcome = self.run_logged(request).await;

        let update = match &outcome {
            Ok(result) => ExtractionUpdate::completed(request, result.clone()),
            Err(kind) => ExtractionUpdate::failed(request, *kind),
        };

        if let Err(err) = sink.deliver(update).await {
            warn!(
                artifact_id = %request.artifact_id,
                session_id = %request.session_id,
                error = %err,
                "Extraction update not delivered"
            );
        }

        outcome.ok()
    }

    /// Extract, falling back to directory discovery when the primary source
    /// path is missing.
    ///
    /// Discovery never overrides an existing primary path, and the retry
    /// happens at most once.
    pub async fn extract_with_fallback(&self, request: &TrimRequest) -> Option<TrimResult> {
        if let Some(result) = self.extract(request).await {
            return Some(result);
        }

        if request.source_path.exists() {
            // The primary file was there and the pipeline still failed;
            // a different source would not be the same moment.
            return None;
        }

        let dir = self.config.discovery_dir.as_ref()?;
        let discovered = find_latest_buffer(dir, self.config.discovery_max_age).await?;
        info!(
            artifact_id = %request.artifact_id,
            session_id = %request.session_id,
            discovered = %discovered.display(),
            "Retrying extraction with discovered buffer file"
        );

        let retry = TrimRequest {
            source_path: discovered,
            ..request.clone()
        };
        self.extract(&retry).await
    }

    /// Run the pipeline under a concurrency permit and classify the outcome.
    async fn run_logged(&self, request: &TrimRequest) -> Result<TrimResult, &'static str> {
        // The semaphore is never closed while the extractor lives; a failed
        // acquire means the process is tearing down.
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Err("binary_unavailable"),
        };

        info!(
            artifact_id = %request.artifact_id,
            session_id = %request.session_id,
            source = %request.source_path.display(),
            requested_start = request.requested_start,
            requested_end = request.requested_end,
            "Starting clip extraction"
        );

        match self.run_pipeline(request).await {
            Ok(result) => {
                info!(
                    artifact_id = %request.artifact_id,
                    session_id = %request.session_id,
                    clip = %result.clip_path.display(),
                    duration_seconds = result.duration_seconds,
                    file_size_bytes = result.file_size_bytes,
                    has_thumbnail = result.thumbnail_path.is_some(),
                    "Clip extraction complete"
                );
                Ok(result)
            }
            Err(err) => {
                error!(
                    artifact_id = %request.artifact_id,
                    session_id = %request.session_id,
                    source = %request.source_path.display(),
                    requested_start = request.requested_start,
                    requested_end = request.requested_end,
                    session_started_at_epoch_ms = request.session_started_at_epoch_ms,
                    buffer_saved_at_epoch_ms = request.buffer_saved_at_epoch_ms,
                    error_kind = err.kind(),
                    diagnostics = err.stderr().unwrap_or_default(),
                    error = %err,
                    "Clip extraction failed"
                );
                Err(err.kind())
            }
        }
    }

    /// The sequential probe → offsets → trim → thumbnail pipeline.
    async fn run_pipeline(&self, request: &TrimRequest) -> PipelineResult<TrimResult> {
        debug!(
            artifact_id = %request.artifact_id,
            stage = ExtractionStage::Probing.as_str(),
            source = %request.source_path.display(),
            "Probing buffer file"
        );
        let source_meta = self.prober.probe(&request.source_path).await?;

        let offsets = compute_offsets(request, source_meta.duration_seconds);
        debug!(
            artifact_id = %request.artifact_id,
            stage = ExtractionStage::ComputingOffsets.as_str(),
            probed_duration = source_meta.duration_seconds,
            in_seconds = offsets.in_seconds,
            out_seconds = offsets.out_seconds,
            "Mapped session window onto buffer offsets"
        );

        debug!(
            artifact_id = %request.artifact_id,
            stage = ExtractionStage::Transcoding.as_str(),
            "Trimming clip"
        );
        let clip_path = self
            .transcoder
            .trim(
                &request.source_path,
                &offsets,
                request.output_format,
                &request.session_dir,
                &request.artifact_id,
                self.config.transcode_timeout(offsets.duration_seconds),
            )
            .await?;

        // Thumbnail failure never unwinds the clip: null the path and move on.
        debug!(
            artifact_id = %request.artifact_id,
            stage = ExtractionStage::ExtractingThumbnail.as_str(),
            "Extracting thumbnail"
        );
        let thumbnail_path = match self
            .thumbnails
            .at_midpoint(&clip_path, offsets.duration_seconds)
            .await
        {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(
                    artifact_id = %request.artifact_id,
                    clip = %clip_path.display(),
                    error = %err,
                    "Thumbnail extraction failed, continuing without one"
                );
                None
            }
        };

        Ok(self
            .finish_result(request, &offsets, source_meta, clip_path, thumbnail_path)
            .await)
    }

    /// Assemble the result, probing the produced clip for its real metadata.
    async fn finish_result(
        &self,
        request: &TrimRequest,
        offsets: &BufferOffsets,
        source_meta: VideoMetadata,
        clip_path: PathBuf,
        thumbnail_path: Option<PathBuf>,
    ) -> TrimResult {
        // The clip just got written by our own transcode; if probing it
        // fails anyway, fall back to what we asked ffmpeg to produce.
        let clip_meta = match self.prober.probe(&clip_path).await {
            Ok(meta) => meta,
            Err(err) => {
                debug!(
                    artifact_id = %request.artifact_id,
                    clip = %clip_path.display(),
                    error = %err,
                    "Cannot probe produced clip, reporting expected values"
                );
                VideoMetadata {
                    duration_seconds: offsets.duration_seconds,
                    ..source_meta
                }
            }
        };

        let duration_seconds = if clip_meta.has_duration() {
            clip_meta.duration_seconds
        } else {
            offsets.duration_seconds
        };

        let file_size_bytes = tokio::fs::metadata(&clip_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let profile = OutputProfile::for_format(request.output_format);

        TrimResult {
            clip_path,
            thumbnail_path,
            duration_seconds,
            output_format: request.output_format,
            video_codec: profile.video_codec.to_string(),
            audio_codec: profile.audio_codec.to_string(),
            metadata: clip_meta,
            file_size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use clipcast_media::ToolPaths;
    use clipcast_models::{ArtifactId, SessionId};

    fn config_with_bogus_tools() -> PipelineConfig {
        PipelineConfig {
            tools: ToolPaths::explicit("/nonexistent/ffprobe", "/nonexistent/ffmpeg"),
            ..PipelineConfig::default()
        }
    }

    fn request(source: &str) -> TrimRequest {
        TrimRequest::new(
            source,
            "/tmp/clipcast-test-session",
            ArtifactId::from_string("a1"),
            SessionId::from_string("s1"),
            10.0,
            20.0,
        )
    }

    #[tokio::test]
    async fn test_extract_absorbs_all_failures() {
        let extractor = ReplayExtractor::new(config_with_bogus_tools());
        let result = extractor.extract(&request("/missing/replay.mp4")).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_failed_delivery_carries_error_kind() {
        let extractor = ReplayExtractor::new(config_with_bogus_tools());
        let (sink, mut rx) = ChannelSink::channel(4);

        let result = extractor
            .extract_and_deliver(&request("/missing/replay.mp4"), &sink)
            .await;
        assert!(result.is_none());

        let update = rx.recv().await.unwrap();
        assert_eq!(update.stage, ExtractionStage::Failed);
        assert_eq!(update.failure_kind.as_deref(), Some("input_not_found"));
        assert!(update.result.is_none());
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let extractor = ReplayExtractor::new(config_with_bogus_tools());
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);

        // Closed sink must not panic or change the outcome.
        let result = extractor
            .extract_and_deliver(&request("/missing/replay.mp4"), &sink)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fallback_without_discovery_dir_gives_up() {
        let extractor = ReplayExtractor::new(config_with_bogus_tools());
        let result = extractor
            .extract_with_fallback(&request("/missing/replay.mp4"))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fallback_skips_discovery_when_primary_exists() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("replay.mp4");
        std::fs::write(&source, b"fake").unwrap();

        // Discovery dir holds a fresh file, but the primary path exists, so
        // the pipeline fails on the bogus tools without ever retrying.
        let decoy = dir.path().join("decoy.mp4");
        std::fs::write(&decoy, b"fresh").unwrap();

        let config = PipelineConfig {
            discovery_dir: Some(dir.path().to_path_buf()),
            ..config_with_bogus_tools()
        };
        let extractor = ReplayExtractor::new(config);

        let result = extractor
            .extract_with_fallback(&request(source.to_str().unwrap()))
            .await;
        assert!(result.is_none());
    }
}
