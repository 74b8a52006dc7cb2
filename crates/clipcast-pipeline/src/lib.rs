//! Replay-buffer clip extraction orchestrator.
//!
//! Ties the media components together into a best-effort pipeline:
//! probe the saved buffer, map the requested session window onto file
//! offsets, trim, then extract a thumbnail. Every internal failure is
//! classified, logged with full request context, and absorbed — callers get
//! `Option<TrimResult>`, never an error.

pub mod config;
pub mod extract;
pub mod sink;

pub use config::PipelineConfig;
pub use extract::ReplayExtractor;
pub use sink::{ChannelSink, DiscardingSink, ResultSink};
