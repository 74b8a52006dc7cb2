//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use clipcast_media::ToolPaths;
use clipcast_models::OutputFormat;

/// Extraction pipeline configuration.
///
/// Built once at startup (environment-driven) and shared read-only; there is
/// no runtime reconfiguration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved external tool paths
    pub tools: ToolPaths,
    /// Container format used when a request does not specify one
    pub default_output_format: OutputFormat,
    /// Rolling buffer length assumed when a request does not carry one
    pub default_buffer_window_seconds: f64,
    /// Replay output directory scanned by discovery fallback
    pub discovery_dir: Option<PathBuf>,
    /// Maximum age for a discovered buffer file
    pub discovery_max_age: Duration,
    /// Probe invocation timeout
    pub probe_timeout: Duration,
    /// Thumbnail invocation timeout
    pub thumbnail_timeout: Duration,
    /// Fixed part of the transcode timeout
    pub transcode_timeout_base: Duration,
    /// Additional transcode timeout per second of clip
    pub transcode_timeout_per_second: f64,
    /// Maximum extractions running at once
    pub max_concurrent_extractions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            default_output_format: OutputFormat::Mp4,
            default_buffer_window_seconds: 300.0,
            discovery_dir: None,
            discovery_max_age: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            thumbnail_timeout: Duration::from_secs(5),
            transcode_timeout_base: Duration::from_secs(30),
            transcode_timeout_per_second: 4.0,
            max_concurrent_extractions: 2,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            tools: ToolPaths::from_env(),
            default_output_format: std::env::var("CLIPCAST_OUTPUT_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            default_buffer_window_seconds: std::env::var("CLIPCAST_BUFFER_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300.0),
            discovery_dir: std::env::var("CLIPCAST_REPLAY_DIR").ok().map(PathBuf::from),
            discovery_max_age: Duration::from_secs(
                std::env::var("CLIPCAST_DISCOVERY_MAX_AGE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            probe_timeout: Duration::from_secs(
                std::env::var("CLIPCAST_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            thumbnail_timeout: Duration::from_secs(
                std::env::var("CLIPCAST_THUMBNAIL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            transcode_timeout_base: Duration::from_secs(
                std::env::var("CLIPCAST_TRANSCODE_TIMEOUT_BASE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            transcode_timeout_per_second: std::env::var("CLIPCAST_TRANSCODE_TIMEOUT_PER_SEC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4.0),
            max_concurrent_extractions: std::env::var("CLIPCAST_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }

    /// Transcode timeout ceiling for a clip of the given length.
    pub fn transcode_timeout(&self, clip_seconds: f64) -> Duration {
        let extra = (clip_seconds.max(0.0) * self.transcode_timeout_per_second).ceil() as u64;
        self.transcode_timeout_base + Duration::from_secs(extra)
    }
}
