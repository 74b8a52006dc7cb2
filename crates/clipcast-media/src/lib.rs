//! FFmpeg CLI wrapper for replay-buffer clip extraction.
//!
//! This crate shells out to `ffprobe`/`ffmpeg` for all media work:
//! - `probe`: read duration, streams, and codec info from a buffer file
//! - `offsets`: map session-relative windows onto physical file offsets
//! - `trim`: cut and re-encode the windowed clip
//! - `thumbnail`: extract preview frames from a finished clip
//! - `discovery`: locate a recently saved buffer file when the caller has none
//!
//! Every child process runs under a bounded timeout and is killed on expiry.

pub mod command;
pub mod discovery;
pub mod error;
pub mod offsets;
pub mod probe;
pub mod thumbnail;
pub mod tools;
pub mod trim;

pub use command::{FfmpegCommand, FfmpegRunner, ToolError};
pub use discovery::find_latest_buffer;
pub use error::{PipelineError, PipelineResult};
pub use offsets::{compute_offsets, BufferOffsets, MIN_CLIP_SECONDS};
pub use probe::Prober;
pub use thumbnail::ThumbnailExtractor;
pub use tools::ToolPaths;
pub use trim::Transcoder;
