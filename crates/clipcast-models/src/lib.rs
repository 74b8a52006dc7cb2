//! Shared data models for the ClipCast replay pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Artifact and session identifiers
//! - Trim requests and results for replay-buffer extraction
//! - Probed video metadata
//! - Output formats and encoding profiles
//! - Extraction stage reporting

pub mod artifact;
pub mod clip;
pub mod encoding;
pub mod video;

// Re-export common types
pub use artifact::{ArtifactId, SessionId};
pub use clip::{ExtractionStage, ExtractionUpdate, TrimRequest, TrimResult};
pub use encoding::{OutputFormat, OutputProfile, UnknownFormatError};
pub use video::VideoMetadata;
