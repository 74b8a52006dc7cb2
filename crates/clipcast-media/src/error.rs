//! Error types for the extraction pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::command::ToolError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures the extraction pipeline can hit.
///
/// This is a closed taxonomy: every failure site maps into one of these
/// variants with the source path attached, so the orchestrator can log a
/// stable `kind` label and the tool's own diagnostics without ever seeing an
/// unclassified error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("probe failed for {path}: {message}")]
    ProbeFailed {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("no video stream in {path}")]
    NoVideoStream { path: PathBuf },

    #[error("transcode failed for {path}: {message}")]
    TranscodeFailed {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("thumbnail extraction failed for {path}: {message}")]
    ThumbnailFailed {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("{tool} is not available")]
    BinaryUnavailable { tool: String },
}

impl PipelineError {
    /// Create an input-not-found error.
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// Create a probe failure error.
    pub fn probe_failed(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::ProbeFailed {
            path: path.into(),
            message: message.into(),
            stderr,
        }
    }

    /// Create a no-video-stream error.
    pub fn no_video_stream(path: impl Into<PathBuf>) -> Self {
        Self::NoVideoStream { path: path.into() }
    }

    /// Create a transcode failure error.
    pub fn transcode_failed(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::TranscodeFailed {
            path: path.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a thumbnail failure error.
    pub fn thumbnail_failed(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::ThumbnailFailed {
            path: path.into(),
            message: message.into(),
            stderr,
        }
    }

    /// Create a missing-binary error.
    pub fn binary_unavailable(tool: impl Into<String>) -> Self {
        Self::BinaryUnavailable { tool: tool.into() }
    }

    /// Classify a probe-stage tool failure.
    pub fn from_probe_tool(path: &Path, err: ToolError) -> Self {
        match err {
            ToolError::MissingBinary { tool } => Self::binary_unavailable(tool),
            other => {
                let (message, stderr) = other.into_parts();
                Self::probe_failed(path, message, stderr)
            }
        }
    }

    /// Classify a transcode-stage tool failure.
    pub fn from_transcode_tool(path: &Path, err: ToolError) -> Self {
        match err {
            ToolError::MissingBinary { tool } => Self::binary_unavailable(tool),
            ToolError::NonZeroExit { exit_code, stderr } => Self::transcode_failed(
                path,
                format!("ffmpeg exited with status {exit_code}"),
                Some(stderr),
                Some(exit_code),
            ),
            other => {
                let (message, stderr) = other.into_parts();
                Self::transcode_failed(path, message, stderr, None)
            }
        }
    }

    /// Classify a thumbnail-stage tool failure.
    pub fn from_thumbnail_tool(path: &Path, err: ToolError) -> Self {
        match err {
            ToolError::MissingBinary { tool } => Self::binary_unavailable(tool),
            other => {
                let (message, stderr) = other.into_parts();
                Self::thumbnail_failed(path, message, stderr)
            }
        }
    }

    /// Stable snake_case label for logs and sink updates.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InputNotFound { .. } => "input_not_found",
            PipelineError::ProbeFailed { .. } => "probe_failed",
            PipelineError::NoVideoStream { .. } => "no_video_stream",
            PipelineError::TranscodeFailed { .. } => "transcode_failed",
            PipelineError::ThumbnailFailed { .. } => "thumbnail_failed",
            PipelineError::BinaryUnavailable { .. } => "binary_unavailable",
        }
    }

    /// Tool stderr captured for this failure, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            PipelineError::ProbeFailed { stderr, .. }
            | PipelineError::TranscodeFailed { stderr, .. }
            | PipelineError::ThumbnailFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
