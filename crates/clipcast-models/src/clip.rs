//! Trim requests, results, and extraction progress models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ArtifactId, OutputFormat, SessionId, VideoMetadata};

/// Default rolling replay-buffer length in seconds.
pub const DEFAULT_BUFFER_WINDOW_SECONDS: f64 = 300.0;

/// A request to cut one clip out of a saved replay-buffer file.
///
/// `requested_start` / `requested_end` are session-relative seconds (elapsed
/// since the session went live), not offsets into the file; the pipeline maps
/// them onto physical file offsets using the timing fields.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrimRequest {
    /// Path to the saved replay-buffer file
    pub source_path: PathBuf,

    /// Directory that receives the clip and thumbnail
    pub session_dir: PathBuf,

    /// ID for the artifact being produced
    pub artifact_id: ArtifactId,

    /// Owning session
    pub session_id: SessionId,

    /// Window start, seconds since session start
    pub requested_start: f64,

    /// Window end, seconds since session start
    pub requested_end: f64,

    /// Container format for the output clip
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Epoch milliseconds when the session went live. `0` when unknown.
    #[serde(default)]
    pub session_started_at_epoch_ms: i64,

    /// Epoch milliseconds when the replay buffer was saved. `0` when unknown.
    #[serde(default)]
    pub buffer_saved_at_epoch_ms: i64,

    /// Configured rolling buffer length in seconds
    #[serde(default = "default_buffer_window")]
    pub buffer_window_seconds: f64,
}

fn default_buffer_window() -> f64 {
    DEFAULT_BUFFER_WINDOW_SECONDS
}

impl TrimRequest {
    /// Create a new trim request with unknown timing and default format.
    pub fn new(
        source_path: impl Into<PathBuf>,
        session_dir: impl Into<PathBuf>,
        artifact_id: ArtifactId,
        session_id: SessionId,
        requested_start: f64,
        requested_end: f64,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            session_dir: session_dir.into(),
            artifact_id,
            session_id,
            requested_start,
            requested_end,
            output_format: OutputFormat::default(),
            session_started_at_epoch_ms: 0,
            buffer_saved_at_epoch_ms: 0,
            buffer_window_seconds: DEFAULT_BUFFER_WINDOW_SECONDS,
        }
    }

    /// Set the wall-clock anchors for offset mapping.
    pub fn with_timing(mut self, session_started_at_epoch_ms: i64, buffer_saved_at_epoch_ms: i64) -> Self {
        self.session_started_at_epoch_ms = session_started_at_epoch_ms;
        self.buffer_saved_at_epoch_ms = buffer_saved_at_epoch_ms;
        self
    }

    /// Set the output container format.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set the configured rolling buffer length.
    pub fn with_buffer_window(mut self, seconds: f64) -> Self {
        self.buffer_window_seconds = seconds;
        self
    }

    /// Requested window length in seconds (may be zero or negative for
    /// degenerate requests; the offset mapping repairs those).
    pub fn requested_window_seconds(&self) -> f64 {
        self.requested_end - self.requested_start
    }

    /// Whether the wall-clock anchors are usable for offset reconciliation.
    ///
    /// The save event must postdate the session start; a zero save epoch is
    /// the "unknown" sentinel.
    pub fn timing_known(&self) -> bool {
        self.session_started_at_epoch_ms >= 0
            && self.buffer_saved_at_epoch_ms > self.session_started_at_epoch_ms
    }
}

/// A successfully extracted clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrimResult {
    /// Path to the trimmed clip
    pub clip_path: PathBuf,

    /// Path to the thumbnail, if one was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    /// Actual clip duration in seconds
    pub duration_seconds: f64,

    /// Container format of the clip
    pub output_format: OutputFormat,

    /// Video codec used
    pub video_codec: String,

    /// Audio codec used
    pub audio_codec: String,

    /// Probed metadata of the produced clip
    pub metadata: VideoMetadata,

    /// Clip file size in bytes
    #[serde(default)]
    pub file_size_bytes: u64,
}

/// Stage of the extraction pipeline, for progress reporting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStage {
    /// Probing the source buffer file
    Probing,
    /// Mapping the session window onto file offsets
    ComputingOffsets,
    /// Running the trim transcode
    Transcoding,
    /// Extracting the thumbnail
    ExtractingThumbnail,
    /// Pipeline finished with a clip
    Complete,
    /// Pipeline finished without a clip
    Failed,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::Probing => "probing",
            ExtractionStage::ComputingOffsets => "computing_offsets",
            ExtractionStage::Transcoding => "transcoding",
            ExtractionStage::ExtractingThumbnail => "extracting_thumbnail",
            ExtractionStage::Complete => "complete",
            ExtractionStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExtractionStage::Complete | ExtractionStage::Failed)
    }
}

/// Terminal notification delivered to the result sink after an extraction.
///
/// Carries either a result or a failure kind, never both.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionUpdate {
    /// Artifact the extraction was for
    pub artifact_id: ArtifactId,

    /// Owning session
    pub session_id: SessionId,

    /// Requested window start (session-relative seconds)
    pub requested_start: f64,

    /// Requested window end (session-relative seconds)
    pub requested_end: f64,

    /// Epoch milliseconds when the session went live
    pub session_started_at_epoch_ms: i64,

    /// Epoch milliseconds when the replay buffer was saved
    pub buffer_saved_at_epoch_ms: i64,

    /// Terminal stage (`Complete` or `Failed`)
    pub stage: ExtractionStage,

    /// The extracted clip, when the pipeline succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TrimResult>,

    /// Stable failure label, when the pipeline failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,

    /// When the pipeline finished
    pub completed_at: DateTime<Utc>,
}

impl ExtractionUpdate {
    /// Build a success update for a finished extraction.
    pub fn completed(request: &TrimRequest, result: TrimResult) -> Self {
        Self {
            artifact_id: request.artifact_id.clone(),
            session_id: request.session_id.clone(),
            requested_start: request.requested_start,
            requested_end: request.requested_end,
            session_started_at_epoch_ms: request.session_started_at_epoch_ms,
            buffer_saved_at_epoch_ms: request.buffer_saved_at_epoch_ms,
            stage: ExtractionStage::Complete,
            result: Some(result),
            failure_kind: None,
            completed_at: Utc::now(),
        }
    }

    /// Build a failure update carrying the stable error label.
    pub fn failed(request: &TrimRequest, failure_kind: impl Into<String>) -> Self {
        Self {
            artifact_id: request.artifact_id.clone(),
            session_id: request.session_id.clone(),
            requested_start: request.requested_start,
            requested_end: request.requested_end,
            session_started_at_epoch_ms: request.session_started_at_epoch_ms,
            buffer_saved_at_epoch_ms: request.buffer_saved_at_epoch_ms,
            stage: ExtractionStage::Failed,
            result: None,
            failure_kind: Some(failure_kind.into()),
            completed_at: Utc::now(),
        }
    }

    /// Whether this update carries a clip.
    pub fn is_success(&self) -> bool {
        self.stage == ExtractionStage::Complete && self.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TrimRequest {
        TrimRequest::new(
            "/tmp/replay.mp4",
            "/tmp/session",
            ArtifactId::from_string("artifact-1"),
            SessionId::from_string("session-1"),
            100.0,
            130.0,
        )
    }

    #[test]
    fn test_request_defaults() {
        let req = request();
        assert_eq!(req.output_format, OutputFormat::Mp4);
        assert_eq!(req.buffer_window_seconds, DEFAULT_BUFFER_WINDOW_SECONDS);
        assert!(!req.timing_known());
        assert!((req.requested_window_seconds() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_request_builders() {
        let req = request()
            .with_timing(1_000_000, 1_300_000)
            .with_output_format(OutputFormat::Matroska)
            .with_buffer_window(120.0);

        assert!(req.timing_known());
        assert_eq!(req.output_format, OutputFormat::Matroska);
        assert_eq!(req.buffer_window_seconds, 120.0);
    }

    #[test]
    fn test_timing_unknown_when_partial() {
        let req = request().with_timing(1_000_000, 0);
        assert!(!req.timing_known());

        let req = request().with_timing(-1, 300_000);
        assert!(!req.timing_known());

        let req = request().with_timing(400_000, 300_000);
        assert!(!req.timing_known(), "save event must postdate session start");
    }

    #[test]
    fn test_timing_known_with_epoch_zero_start() {
        let req = request().with_timing(0, 300_000);
        assert!(req.timing_known());
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(ExtractionStage::ComputingOffsets.as_str(), "computing_offsets");
        assert!(ExtractionStage::Complete.is_terminal());
        assert!(ExtractionStage::Failed.is_terminal());
        assert!(!ExtractionStage::Transcoding.is_terminal());
    }

    #[test]
    fn test_stage_serde_snake_case() {
        let json = serde_json::to_string(&ExtractionStage::ExtractingThumbnail).unwrap();
        assert_eq!(json, "\"extracting_thumbnail\"");
    }

    #[test]
    fn test_failure_update() {
        let update = ExtractionUpdate::failed(&request(), "probe_failed");
        assert_eq!(update.stage, ExtractionStage::Failed);
        assert_eq!(update.failure_kind.as_deref(), Some("probe_failed"));
        assert!(update.result.is_none());
        assert!(!update.is_success());
    }

    #[test]
    fn test_completed_update() {
        let result = TrimResult {
            clip_path: PathBuf::from("/tmp/session/clip_artifact-1.mp4"),
            thumbnail_path: None,
            duration_seconds: 30.0,
            output_format: OutputFormat::Mp4,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            metadata: VideoMetadata::default(),
            file_size_bytes: 1024,
        };

        let update = ExtractionUpdate::completed(&request(), result);
        assert!(update.is_success());
        assert!(update.failure_kind.is_none());
    }
}
